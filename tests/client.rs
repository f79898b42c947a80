mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sdmx_json::{Client, ClientConfig, DataQuery, DimensionFilter, Error, FetchStats, LabelMode};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATA_PATH: &str = "/rest/data/UNICEF,GLOBAL_DATAFLOW,1.0/CZE+DZA.CME_MRM0";

fn query() -> DataQuery {
    DataQuery::new("UNICEF", "GLOBAL_DATAFLOW", "1.0").with_filter(DimensionFilter::dimensions([
        ("REF_AREA", vec!["CZE", "DZA"]),
        ("INDICATOR", vec!["CME_MRM0"]),
    ]))
}

fn endpoint(server: &MockServer) -> String {
    format!("{}/rest", server.uri())
}

fn client(endpoint: &str, cache_dir: Option<PathBuf>) -> Client {
    let mut cfg = ClientConfig::new(endpoint);
    cfg.cache_dir = cache_dir.clone();
    let client = Client::from_config(cfg).unwrap();
    if cache_dir.is_none() {
        client.with_cache(None)
    } else {
        client
    }
}

/// The blocking client is created, used and dropped off the async runtime.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.unwrap()
}

async fn mount_document(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("format", "sdmx-json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::unicef_document()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn get_data_builds_url_and_decodes_records() {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let url = endpoint(&server);
    let table = blocking(move || client(&url, None).get_data(&query()))
        .await
        .unwrap();

    assert_eq!(table.len(), 5);
    assert_eq!(
        table.columns(),
        [
            "REF_AREA",
            "Geographic area",
            "INDICATOR",
            "Indicator",
            "SEX",
            "Sex",
            "TIME_PERIOD",
            "OBS_VALUE",
            "UNIT_MEASURE",
            "Unit of measure",
            "OBS_STATUS",
            "Observation Status",
        ]
    );
    assert_eq!(table.cell(0, "Geographic area").as_deref(), Some("Czechia"));
    assert_eq!(table.cell(3, "REF_AREA").as_deref(), Some("DZA"));
    assert_eq!(table.cell(3, "TIME_PERIOD").as_deref(), Some("2019"));
    assert_eq!(table.values().unwrap().value(3), 23.9);
    assert_eq!(
        table.cell(4, "Observation Status").as_deref(),
        Some("Estimated value")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn id_labels_drop_name_columns() {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let url = endpoint(&server);
    let table = blocking(move || {
        client(&url, None).get_data(&query().with_labels(LabelMode::Id))
    })
    .await
    .unwrap();
    assert_eq!(
        table.columns(),
        [
            "REF_AREA",
            "INDICATOR",
            "SEX",
            "TIME_PERIOD",
            "OBS_VALUE",
            "UNIT_MEASURE",
            "OBS_STATUS"
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn last_n_observations_sends_default_start_period() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/data/UNICEF,GLOBAL_DATAFLOW,1.0/all"))
        .and(query_param("format", "sdmx-json"))
        .and(query_param("startPeriod", "1900"))
        .and(query_param("lastnobservations", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::unicef_document()))
        .expect(1)
        .mount(&server)
        .await;

    let url = endpoint(&server);
    let table = blocking(move || {
        let q = DataQuery::new("UNICEF", "GLOBAL_DATAFLOW", "1.0").with_last_n_observations(true);
        client(&url, None).get_data(&q)
    })
    .await
    .unwrap();
    assert_eq!(table.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_request_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let cache_dir = tempfile::tempdir().unwrap();
    let dir = cache_dir.path().to_path_buf();
    let seen: Arc<Mutex<Vec<FetchStats>>> = Arc::default();
    let sink = seen.clone();
    let url = endpoint(&server);

    let (first, second) = blocking(move || {
        let client = client(&url, Some(dir))
            .with_stats_hook(move |stats| sink.lock().unwrap().push(stats.clone()));
        let first = client.get_data(&query()).unwrap();
        let second = client.get_data(&query().with_print_stats(true)).unwrap();
        (first, second)
    })
    .await;
    assert_eq!(first, second);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].from_cache);
    assert!(seen[1].from_cache);
    assert_eq!(seen[0].records, 5);
    assert_eq!(seen[0].url, seen[1].url);
    assert!(seen[0].url.ends_with("/CZE+DZA.CME_MRM0?format=sdmx-json"));
}

#[tokio::test(flavor = "multi_thread")]
async fn different_periods_are_cached_separately() {
    let server = MockServer::start().await;
    mount_document(&server, 2).await;

    let cache_dir = tempfile::tempdir().unwrap();
    let dir = cache_dir.path().to_path_buf();
    let url = endpoint(&server);
    blocking(move || {
        let client = client(&url, Some(dir));
        client.get_data(&query()).unwrap();
        client.get_data(&query().with_start_period("2019")).unwrap();
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_a_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("NoResultsFound"))
        .expect(1)
        .mount(&server)
        .await;

    let url = endpoint(&server);
    let err = blocking(move || client(&url, None).get_data(&query()))
        .await
        .unwrap_err();
    match err {
        Error::Connection {
            url,
            status,
            detail,
        } => {
            assert_eq!(status, 404);
            assert!(url.contains(DATA_PATH), "{url}");
            assert!(url.ends_with("?format=sdmx-json"), "{url}");
            assert_eq!(detail, "NoResultsFound");
        }
        other => panic!("expected a connection error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_payload_is_a_decode_error_and_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"header": {"id": "x"}})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let dir = cache_dir.path().to_path_buf();
    let url = endpoint(&server);
    let errors = blocking(move || {
        let client = client(&url, Some(dir));
        [client.get_data(&query()), client.get_data(&query())]
    })
    .await;
    for result in errors {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");
    }
}
