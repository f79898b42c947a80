//! Data query construction.
//!
//! Translates a [`DataQuery`] into the SDMX REST grammar:
//! `{endpoint}data/{agency},{id},{version}/{filter}?format=sdmx-json[...]`.

use indexmap::IndexMap;
use std::borrow::Cow;
use tracing::debug;
use url::Url;

use crate::decode::LabelMode;
use crate::error::Result;
use crate::util::normalize_endpoint;

/// Filter token that selects every series of a dataflow.
pub const ALL_FILTER: &str = "all";

/// Data format requested from the service.
pub const FORMAT: &str = "sdmx-json";

/// Start period sent with `lastnobservations` when the caller gave none.
pub const LAST_N_DEFAULT_START: &str = "1900";

/// Which series to retrieve.
///
/// Within a dimension, codes are OR-ed (`+`); across dimensions they are
/// AND-ed positionally (`.`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DimensionFilter {
    /// Every series (`all`).
    #[default]
    All,
    /// A pre-joined filter such as `CZE+DZA.CME_MRM0.`, sent verbatim.
    Raw(String),
    /// Dimension name to selected codes, in dimension order.
    Dimensions(IndexMap<String, Vec<String>>),
}

impl DimensionFilter {
    /// Builds a [`DimensionFilter::Dimensions`] from `(dimension, codes)` pairs.
    pub fn dimensions<I, K, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::Dimensions(
            pairs
                .into_iter()
                .map(|(k, codes)| (k.into(), codes.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    pub fn is_all(&self) -> bool {
        match self {
            DimensionFilter::All => true,
            DimensionFilter::Raw(s) => s.trim().is_empty(),
            DimensionFilter::Dimensions(dims) => dims.values().all(Vec::is_empty),
        }
    }

    /// Resolves the filter to the URL path segment.
    ///
    /// A dimension with no codes still yields an empty segment so the
    /// remaining dimensions keep their position.
    pub fn token(&self) -> String {
        if self.is_all() {
            return ALL_FILTER.to_string();
        }
        match self {
            DimensionFilter::Raw(s) => s.clone(),
            DimensionFilter::Dimensions(dims) => dims
                .values()
                .map(|codes| codes.join("+"))
                .collect::<Vec<_>>()
                .join("."),
            DimensionFilter::All => ALL_FILTER.to_string(),
        }
    }
}

impl From<&str> for DimensionFilter {
    fn from(s: &str) -> Self {
        DimensionFilter::Raw(s.to_string())
    }
}

impl From<String> for DimensionFilter {
    fn from(s: String) -> Self {
        DimensionFilter::Raw(s)
    }
}

impl From<IndexMap<String, Vec<String>>> for DimensionFilter {
    fn from(dims: IndexMap<String, Vec<String>>) -> Self {
        DimensionFilter::Dimensions(dims)
    }
}

impl<T: Into<DimensionFilter>> From<Option<T>> for DimensionFilter {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Everything one `get_data` call needs, with explicit defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQuery {
    pub agency: String,
    pub dataset_id: String,
    pub version: String,
    /// Defaults to [`DimensionFilter::All`].
    pub filter: DimensionFilter,
    pub start_period: Option<String>,
    pub end_period: Option<String>,
    /// Ask for the most recent observation of every series only.
    pub last_n_observations: bool,
    /// Emit download/parse statistics as an `info` event.
    pub print_stats: bool,
    /// Defaults to [`LabelMode::Both`].
    pub labels: LabelMode,
}

impl DataQuery {
    pub fn new(
        agency: impl Into<String>,
        dataset_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            agency: agency.into(),
            dataset_id: dataset_id.into(),
            version: version.into(),
            filter: DimensionFilter::All,
            start_period: None,
            end_period: None,
            last_n_observations: false,
            print_stats: false,
            labels: LabelMode::Both,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<DimensionFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_start_period(mut self, period: impl Into<String>) -> Self {
        self.start_period = Some(period.into());
        self
    }

    pub fn with_end_period(mut self, period: impl Into<String>) -> Self {
        self.end_period = Some(period.into());
        self
    }

    pub fn with_last_n_observations(mut self, last: bool) -> Self {
        self.last_n_observations = last;
        self
    }

    pub fn with_print_stats(mut self, print: bool) -> Self {
        self.print_stats = print;
        self
    }

    pub fn with_labels(mut self, labels: LabelMode) -> Self {
        self.labels = labels;
        self
    }
}

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// `{endpoint}data/{agency},{id},{version}/{filter}` without query string.
    pub path: String,
    /// Query parameters in the order they are sent.
    pub params: IndexMap<String, String>,
}

impl DataRequest {
    /// Renders path and parameters into one URL. This string is also the
    /// cache key.
    ///
    /// A key made only of separators (`.` or `..`) selects every series; URL
    /// parsing would drop it as a dot segment, so it is sent as `all`.
    pub fn url(&self) -> Result<Url> {
        let path = match self.path.rsplit_once('/') {
            Some((base, key @ ("." | ".."))) => {
                debug!(key, "sending separator-only key as `{ALL_FILTER}`");
                Cow::Owned(format!("{base}/{ALL_FILTER}"))
            }
            _ => Cow::Borrowed(self.path.as_str()),
        };
        Ok(Url::parse_with_params(&path, self.params.iter())?)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Builds [`DataRequest`]s against one SDMX REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    endpoint: String,
}

impl QueryBuilder {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint),
        }
    }

    /// The endpoint, always with one trailing `/`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build(&self, query: &DataQuery) -> DataRequest {
        let path = format!(
            "{}data/{},{},{}/{}",
            self.endpoint,
            query.agency,
            query.dataset_id,
            query.version,
            query.filter.token()
        );

        let mut params = IndexMap::new();
        params.insert("format".to_string(), FORMAT.to_string());
        if let Some(start) = &query.start_period {
            params.insert("startPeriod".to_string(), start.clone());
        }
        if let Some(end) = &query.end_period {
            params.insert("endPeriod".to_string(), end.clone());
        }
        if query.last_n_observations {
            // Overwrites in place when a start period was given, appends otherwise.
            let start = query
                .start_period
                .clone()
                .unwrap_or_else(|| LAST_N_DEFAULT_START.to_string());
            params.insert("startPeriod".to_string(), start);
            params.insert("lastnobservations".to_string(), "1".to_string());
        }

        DataRequest { path, params }
    }
}
