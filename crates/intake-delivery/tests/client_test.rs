//! Integration tests for the webhook client.
//!
//! Covers body encoding (JSON vs multipart), response categorization and
//! timeout handling against a wiremock receiver.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bytes::Bytes;
use intake_core::{Attachment, Embed, WebhookMessage};
use intake_delivery::{ClientConfig, DeliveryError, WebhookClient};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn message() -> WebhookMessage {
    WebhookMessage {
        username: Some("Bug Reports".into()),
        content: None,
        embeds: vec![Embed {
            title: "[ABCD2345] Broken link".into(),
            description: None,
            color: 0xE7_4C3C,
            fields: Vec::new(),
            footer: None,
            timestamp: None,
        }],
    }
}

fn screenshot() -> Attachment {
    Attachment {
        file_name: "screen.png".into(),
        content_type: "image/png".into(),
        bytes: Bytes::from_static(b"not really a png"),
    }
}

#[tokio::test]
async fn posts_json_without_attachment() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .and(matchers::header("content-type", "application/json"))
        .and(matchers::body_partial_json(json!({"username": "Bug Reports"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebhookClient::with_defaults().unwrap();
    let response = client.send(&format!("{}/hook", server.uri()), &message(), None).await.unwrap();

    assert_eq!(response.status_code, 204);
}

#[tokio::test]
async fn posts_multipart_with_attachment() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::header_regex("content-type", "^multipart/form-data; boundary="))
        .and(matchers::body_string_contains("name=\"payload_json\""))
        .and(matchers::body_string_contains("name=\"files[0]\"; filename=\"screen.png\""))
        .and(matchers::body_string_contains("[ABCD2345] Broken link"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebhookClient::with_defaults().unwrap();
    let file = screenshot();
    let response = client.send(&server.uri(), &message(), Some(&file)).await.unwrap();

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn rate_limit_reads_retry_after_header() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let client = WebhookClient::with_defaults().unwrap();
    let err = client.send(&server.uri(), &message(), None).await.unwrap_err();

    assert_eq!(err, DeliveryError::rate_limited(Some(Duration::from_secs(3))));
}

#[tokio::test]
async fn rate_limit_falls_back_to_body_field() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"message": "You are being rate limited.", "retry_after": 1.5})),
        )
        .mount(&server)
        .await;

    let client = WebhookClient::with_defaults().unwrap();
    let err = client.send(&server.uri(), &message(), None).await.unwrap_err();

    assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
}

#[tokio::test]
async fn categorizes_client_and_server_errors() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Webhook"))
        .mount(&server)
        .await;
    Mock::given(matchers::path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = WebhookClient::with_defaults().unwrap();

    let gone = client.send(&format!("{}/gone", server.uri()), &message(), None).await;
    assert_eq!(gone.unwrap_err(), DeliveryError::client_error(404, "Unknown Webhook"));

    let down = client.send(&format!("{}/down", server.uri()), &message(), None).await;
    assert_eq!(down.unwrap_err(), DeliveryError::server_error(503, "unavailable"));
}

#[tokio::test]
async fn slow_receiver_times_out() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = ClientConfig { timeout: Duration::from_millis(100), ..Default::default() };
    let client = WebhookClient::new(config).unwrap();
    let err = client.send(&server.uri(), &message(), None).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Timeout { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_receiver_is_network_error() {
    let client = WebhookClient::with_defaults().unwrap();
    let err = client.send("http://127.0.0.1:1/hook", &message(), None).await.unwrap_err();

    assert!(matches!(err, DeliveryError::NetworkError { .. }), "{err:?}");
}
