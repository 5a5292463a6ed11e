//! Integration tests for the chart downloader.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use windwatch::{
    ChartDownloader, ChartSource, Clock, CollaboratorError, MockClock, config::NetworkConfig,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const CHART_PATH: &str = "/tb/tcs/meteo/meteo_today.cgi";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake chart body";

fn downloader(server: &MockServer, target: std::path::PathBuf, clock: Arc<dyn Clock>) -> ChartDownloader {
    let config = NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    };
    ChartDownloader::new(format!("{}{}", server.uri(), CHART_PATH), target, &config, clock)
        .expect("Downloader creation should succeed")
}

#[tokio::test]
async fn test_chart_written_to_disk() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("chart.png");
    let now = Utc.with_ymd_and_hms(2024, 10, 18, 21, 15, 30).unwrap();
    let mut charts = downloader(&mock_server, target.clone(), Arc::new(MockClock::new(now)));

    let chart = charts.updated_chart().await.expect("Download should succeed");

    assert_eq!(chart.path, target);
    assert_eq!(chart.created_at, now);
    assert_eq!(std::fs::read(&target).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_chart_overwrites_previous_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("chart.png");
    std::fs::write(&target, b"stale chart from last night").unwrap();

    let mut charts = downloader(&mock_server, target.clone(), Arc::new(MockClock::new(Utc::now())));
    charts.updated_chart().await.unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_chart_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("chart.png");
    let mut charts = downloader(&mock_server, target.clone(), Arc::new(MockClock::new(Utc::now())));

    let result = charts.updated_chart().await;
    assert!(matches!(result, Err(CollaboratorError::Fetch(_))));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_empty_chart_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut charts = downloader(
        &mock_server,
        dir.path().join("chart.png"),
        Arc::new(MockClock::new(Utc::now())),
    );

    assert!(charts.updated_chart().await.is_err());
}

#[tokio::test]
async fn test_unwritable_target_is_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("missing").join("chart.png");
    let mut charts = downloader(&mock_server, target, Arc::new(MockClock::new(Utc::now())));

    let result = charts.updated_chart().await;
    assert!(matches!(result, Err(CollaboratorError::Fetch(_))));
}
