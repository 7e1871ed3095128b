//! Report endpoint tests.
//!
//! Drive the full request lifecycle against a wiremock report webhook:
//! body parsing, bot filters, validation, delivery with the single
//! rate-limit retry, and the mailto fallback. Waits go through the test
//! clock, so nothing sleeps for real.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use intake_testing::{
    http::{client_request, raw_request},
    MultipartBody, ReportBuilder, TestEnv, REPORT_HOOK_PATH,
};
use wiremock::{matchers, Mock, ResponseTemplate};

#[tokio::test]
async fn json_report_is_delivered_with_ticket() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ok"], true);
    let ticket = response.body["ticketId"].as_str().expect("ticket id").to_string();
    assert_eq!(ticket.len(), 8);
    assert!(response.body["message"].is_string());

    let deliveries = env.report_deliveries().await;
    let embed = &deliveries[0]["embeds"][0];
    assert_eq!(embed["title"], format!("[{ticket}] Export button does nothing"));
    assert_eq!(embed["footer"]["text"], format!("Ticket {ticket}"));
}

#[tokio::test]
async fn identical_reports_get_distinct_tickets() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 2).await;

    let first = env.send(ReportBuilder::with_defaults().json_request()).await;
    let second = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_ne!(first.body["ticketId"], second.body["ticketId"]);
}

#[tokio::test]
async fn multipart_report_forwards_attachment() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(200), 1).await;

    let request = ReportBuilder::with_defaults()
        .multipart_request(Some(("console.txt", "text/plain", b"TypeError: x is undefined")));
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

    let received = env.received_on(REPORT_HOOK_PATH).await;
    let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("filename=\"console.txt\""));
    assert!(body.contains("TypeError: x is undefined"));

    let deliveries = env.report_deliveries().await;
    let fields = deliveries[0]["embeds"][0]["fields"].as_array().unwrap();
    let attachment = fields.iter().find(|f| f["name"] == "Attachment").unwrap();
    assert_eq!(attachment["value"], "console.txt (text/plain, 25 bytes)");
}

#[tokio::test]
async fn multipart_loose_fields_fill_payload() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let request = MultipartBody::new()
        .text("summary", "Sidebar overlaps content")
        .text("location", "Docs")
        .file("attachment", "", "application/octet-stream", b"")
        .request("/api/report");
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let deliveries = env.report_deliveries().await;
    let embed = &deliveries[0]["embeds"][0];
    assert_eq!(embed["description"], "Sidebar overlaps content");
}

#[tokio::test]
async fn attachment_exactly_at_cap_is_accepted() {
    let env = TestEnv::builder()
        .max_attachment_bytes(64)
        .build()
        .await
        .expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let file = vec![b'a'; 64];
    let request =
        ReportBuilder::with_defaults().multipart_request(Some(("log.txt", "text/plain", &file)));
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
}

#[tokio::test]
async fn attachment_one_byte_over_cap_is_rejected() {
    let env = TestEnv::builder()
        .max_attachment_bytes(64)
        .build()
        .await
        .expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 0).await;

    let file = vec![b'a'; 65];
    let request =
        ReportBuilder::with_defaults().multipart_request(Some(("log.txt", "text/plain", &file)));
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["ok"], false);
    assert_eq!(response.body["code"], "E1005");
}

#[tokio::test]
async fn disallowed_type_is_rejected_under_cap() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 0).await;

    let request = ReportBuilder::with_defaults()
        .multipart_request(Some(("setup.exe", "application/x-msdownload", b"MZ")));
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "E1006");
}

#[tokio::test]
async fn only_first_attachment_is_kept() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let payload = ReportBuilder::with_defaults().to_json().to_string();
    let request = MultipartBody::new()
        .text("payload", &payload)
        .file("first", "a.txt", "text/plain", b"first")
        .file("second", "b.txt", "text/plain", b"second")
        .request("/api/report");
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let received = env.received_on(REPORT_HOOK_PATH).await;
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("filename=\"a.txt\""));
    assert!(!body.contains("filename=\"b.txt\""));
}

#[tokio::test]
async fn short_summary_is_rejected() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 0).await;

    let request = ReportBuilder::with_defaults().summary("  abcd   ").json_request();
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "E1004");
}

#[tokio::test]
async fn honeypot_gets_generic_rejection() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 0).await;

    let request = ReportBuilder::with_defaults().honeypot("https://spam.example").json_request();
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid submission");
    assert_eq!(response.body["code"], "E2001");
}

#[tokio::test]
async fn fast_submission_gets_same_generic_rejection() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let too_fast =
        ReportBuilder::with_defaults().form_load_time(env.now_ms() - 1_000).json_request();
    let rejected = env.send(too_fast).await;

    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body["error"], "Invalid submission");

    let human = ReportBuilder::with_defaults().form_load_time(env.now_ms() - 5_000).json_request();
    let accepted = env.send(human).await;

    assert_eq!(accepted.status, StatusCode::OK);
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let env = TestEnv::new().await.expect("failed to create test environment");

    let request = raw_request(Method::POST, "/api/report", "text/plain", "summary=hello there");
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "E1003");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let env = TestEnv::new().await.expect("failed to create test environment");

    let request = raw_request(Method::POST, "/api/report", "application/json", "{\"summary\"");
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "E1002");
}

#[tokio::test]
async fn non_post_is_method_not_allowed() {
    let env = TestEnv::new().await.expect("failed to create test environment");

    let request = client_request(Method::GET, "/api/report").body(Body::empty()).unwrap();
    let response = env.send(request).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.body,
        serde_json::json!({ "ok": false, "error": "Method not allowed", "code": "E1008" })
    );
}

#[tokio::test]
async fn webhook_rate_limit_is_retried_once() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook_once(ResponseTemplate::new(429).append_header("Retry-After", "2"))
        .await;
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(env.clock.sleep_count(), 1);
    assert_eq!(env.clock.total_slept(), Duration::from_secs(2));
}

#[tokio::test]
async fn second_rate_limit_falls_back_to_mailto_with_same_ticket() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(429), 2).await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["ok"], false);
    assert_eq!(response.body["code"], "E3002");
    let ticket = response.body["ticketId"].as_str().expect("ticket id");
    let mailto = response.body["mailto"].as_str().expect("mailto link");
    assert!(mailto.starts_with("mailto:support@example.com?subject="));
    assert!(mailto.contains(ticket));
    assert_eq!(env.clock.sleep_count(), 1);
    assert_eq!(env.clock.total_slept(), Duration::from_secs(1));
}

#[tokio::test]
async fn long_requested_wait_is_not_retried() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(429).append_header("Retry-After", "30"), 1)
        .await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "E3002");
    assert!(response.body["mailto"].is_string());
    assert_eq!(env.clock.sleep_count(), 0);
}

#[tokio::test]
async fn slow_webhook_falls_back_to_mailto() {
    let env = TestEnv::builder()
        .delivery_timeout_seconds(1)
        .build()
        .await
        .expect("failed to create test environment");
    Mock::given(matchers::method("POST"))
        .and(matchers::path(REPORT_HOOK_PATH))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(2500)))
        .mount(&env.http_mock)
        .await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "E3002");
    let ticket = response.body["ticketId"].as_str().expect("ticket id");
    assert!(response.body["mailto"].as_str().expect("mailto link").contains(ticket));
    assert_eq!(env.clock.sleep_count(), 0);
}

#[tokio::test]
async fn missing_webhook_falls_back_to_mailto() {
    let env = TestEnv::builder()
        .without_report_webhook()
        .build()
        .await
        .expect("failed to create test environment");

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "E3001");
    let ticket = response.body["ticketId"].as_str().expect("ticket id");
    assert!(response.body["mailto"].as_str().unwrap().contains(ticket));
}

#[tokio::test]
async fn webhook_rejection_is_not_retried() {
    let env = TestEnv::new().await.expect("failed to create test environment");
    env.mock_report_webhook(ResponseTemplate::new(404), 1).await;

    let response = env.send(ReportBuilder::with_defaults().json_request()).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["mailto"].is_string());
    assert_eq!(env.clock.sleep_count(), 0);
}

#[tokio::test]
async fn cors_preflight_honors_allow_list() {
    let env = TestEnv::new().await.expect("failed to create test environment");

    let allowed = client_request(Method::OPTIONS, "/api/report")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = env.send(allowed).await;
    assert_eq!(response.headers["access-control-allow-origin"], "http://localhost:3000");

    let denied = client_request(Method::OPTIONS, "/api/report")
        .header("origin", "https://evil.example")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = env.send(denied).await;
    assert!(response.headers.get("access-control-allow-origin").is_none());
}
