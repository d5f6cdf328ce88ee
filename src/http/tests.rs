//! Tests for the HTTP transport module

use super::*;
use crate::error::Error;
use crate::types::StringMap;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::default()
        .with_base_url(server.uri())
        .without_rate_limit();
    HttpClient::with_config(config)
}

fn no_params() -> StringMap {
    StringMap::new()
}

#[tokio::test]
async fn test_get_json_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/ledger"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"internalId": "L1"}])),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get_json("/v1/ledger", &no_params()).await.unwrap();
    assert!(body.is_array());
    assert_eq!(body[0]["internalId"], "L1");
}

#[tokio::test]
async fn test_query_params_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(query_param("pageNumber", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut params = StringMap::new();
    params.insert("pageNumber".to_string(), "2".to_string());
    client.get_json("/v1/account", &params).await.unwrap();
}

#[tokio::test]
async fn test_retries_on_server_error() {
    let server = MockServer::start().await;

    // Two failures then success
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get_json("/v1/account", &no_params()).await.unwrap();
    assert!(body.is_array());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_json("/v1/account", &no_params()).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_json("/v1/account", &no_params()).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_decimal_fields_survive_decoding() {
    let server = MockServer::start().await;

    // A value that loses precision through f64
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"amount": 12345678901234567.89}]"#)
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.get_json("/v1/account", &no_params()).await.unwrap();
    let rendered = serde_json::to_string(&body[0]["amount"]).unwrap();
    assert_eq!(rendered, "12345678901234567.89");
}

#[test]
fn test_backoff_calculation() {
    let config = HttpClientConfig {
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        backoff_type: crate::types::BackoffType::Exponential,
        ..HttpClientConfig::default()
    };
    let client = HttpClient::with_config(config);

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    // Capped at max_backoff
    assert_eq!(client.calculate_backoff(10), Duration::from_secs(1));
}
