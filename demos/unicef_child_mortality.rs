use anyhow::Result;
use sdmx_json::{Client, DataQuery};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Set RUST_LOG=sdmx_json=debug to see request and cache events.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // https://sdmx.data.unicef.org/ws/public/sdmxapi/rest/data/UNICEF,GLOBAL_DATAFLOW,1.0/CZE+DZA.CME_MRM0.?format=sdmx-json
    let endpoint = "https://sdmx.data.unicef.org/ws/public/sdmxapi/rest";
    let client = Client::new(Some(endpoint.to_string()), None)?.with_progress(true);

    let query = DataQuery::new("UNICEF", "GLOBAL_DATAFLOW", "1.0")
        .with_filter("CZE+DZA.CME_MRM0.")
        .with_print_stats(true);

    let table = client.get_data(&query)?;
    println!("{}", table.head(5));
    Ok(())
}
