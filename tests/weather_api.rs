//! Integration tests for the meteo record client.
//!
//! These tests use wiremock to simulate the observatory's meteo file
//! and verify ranged fetching, Last-Modified caching and error handling.

use windwatch::{CollaboratorError, MeteoClient, WeatherSource, config::NetworkConfig};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const DATA_PATH: &str = "/tb/tcs/meteo/data/meteo.dat";
const MODIFIED_A: &str = "Fri, 18 Oct 2024 21:15:00 GMT";
const MODIFIED_B: &str = "Fri, 18 Oct 2024 21:16:00 GMT";

/// A tail as the server returns it: the cut starts inside the previous record.
const TAIL: &str = "   85  310   4.1  12.9  0.0\n18-Oct-2024 21:15:00  754.3   -2.5   85  310   4.2  13.0  0.0\n";
const TAIL_NEXT: &str = "   85  310   4.2  13.0  0.0\n18-Oct-2024 21:16:00  754.2   -2.6   84  305   5.0  15.2  0.0\n";

fn network_config() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    }
}

fn client(server: &MockServer) -> MeteoClient {
    MeteoClient::new(format!("{}{}", server.uri(), DATA_PATH), &network_config())
        .expect("Client creation should succeed")
}

fn head_ok(last_modified: &str) -> Mock {
    Mock::given(method("HEAD"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).insert_header("Last-Modified", last_modified))
}

fn ranged_get(body: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(header("Range", "bytes=-66"))
        .respond_with(ResponseTemplate::new(206).set_body_string(body))
}

/// Test a successful fetch of the newest record.
#[tokio::test]
async fn test_latest_success() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).mount(&mock_server).await;
    ranged_get(TAIL).expect(1).mount(&mock_server).await;

    let mut client = client(&mock_server);
    let observation = client.latest().await.expect("Fetch should succeed");

    assert_eq!(observation.wind_speed, 13.0);
    assert_eq!(observation.temperature, -2.5);
    assert_eq!(observation.observed_at.to_rfc3339(), "2024-10-18T21:15:00+00:00");
}

/// Test that an unchanged Last-Modified header skips the download.
#[tokio::test]
async fn test_unchanged_record_is_served_from_cache() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).expect(3).mount(&mock_server).await;
    ranged_get(TAIL).expect(1).mount(&mock_server).await;

    let mut client = client(&mock_server);
    let first = client.latest().await.unwrap();
    let second = client.latest().await.unwrap();
    let third = client.latest().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
}

/// Test that a new Last-Modified value triggers a fresh download.
#[tokio::test]
async fn test_changed_record_is_refetched() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).up_to_n_times(1).mount(&mock_server).await;
    head_ok(MODIFIED_B).mount(&mock_server).await;
    ranged_get(TAIL).up_to_n_times(1).mount(&mock_server).await;
    ranged_get(TAIL_NEXT).mount(&mock_server).await;

    let mut client = client(&mock_server);
    assert_eq!(client.latest().await.unwrap().wind_speed, 13.0);
    assert_eq!(client.latest().await.unwrap().wind_speed, 15.2);
}

/// Test that a server without Last-Modified is read on every call.
#[tokio::test]
async fn test_missing_last_modified_disables_cache() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    ranged_get(TAIL).expect(2).mount(&mock_server).await;

    let mut client = client(&mock_server);
    client.latest().await.unwrap();
    client.latest().await.unwrap();
}

/// Test that a full 200 response is rejected; only the ranged tail is parsed.
#[tokio::test]
async fn test_full_response_is_fetch_error() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).mount(&mock_server).await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(TAIL))
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    let result = client.latest().await;
    assert!(matches!(result, Err(CollaboratorError::Fetch(_))));
}

/// Test HEAD failure handling.
#[tokio::test]
async fn test_head_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    ranged_get(TAIL).expect(0).mount(&mock_server).await;

    let mut client = client(&mock_server);
    let result = client.latest().await;
    assert!(matches!(result, Err(CollaboratorError::Fetch(_))));
}

/// Test that a garbled record is a parse error.
#[tokio::test]
async fn test_malformed_record_is_parse_error() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).mount(&mock_server).await;
    ranged_get("<html>maintenance</html>\n").mount(&mock_server).await;

    let mut client = client(&mock_server);
    let result = client.latest().await;
    assert!(matches!(result, Err(CollaboratorError::Parse(_))));
}

/// Test that a failed parse does not pin the broken record's marker.
#[tokio::test]
async fn test_parse_failure_does_not_poison_cache() {
    let mock_server = MockServer::start().await;
    head_ok(MODIFIED_A).up_to_n_times(1).mount(&mock_server).await;
    head_ok(MODIFIED_B).mount(&mock_server).await;
    ranged_get(TAIL).up_to_n_times(1).mount(&mock_server).await;
    ranged_get("garbage\n").up_to_n_times(1).mount(&mock_server).await;
    ranged_get(TAIL_NEXT).mount(&mock_server).await;

    let mut client = client(&mock_server);
    assert_eq!(client.latest().await.unwrap().wind_speed, 13.0);
    assert!(matches!(
        client.latest().await,
        Err(CollaboratorError::Parse(_))
    ));
    // Same marker as the failed attempt, but the record must be read again.
    assert_eq!(client.latest().await.unwrap().wind_speed, 15.2);
}

/// Test connection failure handling.
#[tokio::test]
async fn test_connection_refused() {
    let config = NetworkConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
    };

    // Use a port that's unlikely to be in use
    let mut client = MeteoClient::new("http://127.0.0.1:59999/meteo.dat".to_string(), &config)
        .unwrap();

    let result = client.latest().await;
    assert!(matches!(result, Err(CollaboratorError::Fetch(_))));
}
