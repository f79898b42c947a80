//! A small Rust client for SDMX REST web services that speak SDMX-JSON.
//!
//! This crate implements a fetch-and-flatten flow:
//! build a data query URL, download it (through an on-disk response cache),
//! then flatten the SDMX-JSON data message into one record per observation,
//! collected into an Arrow [`RecordBatch`](arrow::record_batch::RecordBatch).
//!
//! ## Quick start
//! - Configure the endpoint via the environment (`SDMX_URL`) or a `.sdmxrc`
//!   file (supported in the current directory and in your home directory), or
//!   pass it explicitly.
//! - Call [`Client::get_data`] with a [`DataQuery`].
//!
//! ```no_run
//! use sdmx_json::{Client, DataQuery, DimensionFilter};
//!
//! fn main() -> sdmx_json::Result<()> {
//!     let client = Client::new(
//!         Some("https://sdmx.data.unicef.org/ws/public/sdmxapi/rest".to_string()),
//!         None,
//!     )?;
//!     let query = DataQuery::new("UNICEF", "GLOBAL_DATAFLOW", "1.0").with_filter(
//!         DimensionFilter::dimensions([
//!             ("REF_AREA", vec!["CZE", "DZA"]),
//!             ("INDICATOR", vec!["CME_MRM0"]),
//!         ]),
//!     );
//!     let table = client.get_data(&query)?;
//!     println!("{}", table.head(5));
//!     Ok(())
//! }
//! ```
//!
//! The query builder and the decoder can also be used on their own, see
//! [`QueryBuilder`] and [`decode`].

#![forbid(unsafe_code)]

mod cache;
mod client;
mod config;
mod decode;
mod error;
mod message;
mod query;
mod record;
mod util;

pub use arrow;
pub use cache::{DEFAULT_TTL, ResponseCache};
pub use client::{Client, ClientConfig, FetchStats, StatsHook};
pub use decode::{LabelMode, decode, decode_str};
pub use error::{Error, Result};
pub use query::{
    ALL_FILTER, DataQuery, DataRequest, DimensionFilter, FORMAT, LAST_N_DEFAULT_START,
    QueryBuilder,
};
pub use record::{Head, OBS_VALUE, Record, TIME_PERIOD, Table};
