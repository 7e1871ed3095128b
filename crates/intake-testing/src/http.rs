//! Mocked collaborators and request helpers.
//!
//! The chat webhooks and the spreadsheet API all live on
//! [`TestEnv::http_mock`]; these helpers mount scripted responses on the
//! paths the environment configures.

use axum::{
    body::Body,
    http::{header, Method, Request},
};
use serde_json::{json, Value};
use wiremock::{matchers, Mock, ResponseTemplate};

use crate::{TestEnv, REPORT_HOOK_PATH, SIGNUP_HOOK_PATH, SPREADSHEET_ID};

/// Default address the helpers report the client from.
pub const TEST_CLIENT_IP: &str = "203.0.113.10";
/// Default user agent the helpers send.
pub const TEST_USER_AGENT: &str = "IntakeTest/1.0";

impl TestEnv {
    /// Mounts `response` on the report webhook, expecting `times` calls.
    pub async fn mock_report_webhook(&self, response: ResponseTemplate, times: u64) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path(REPORT_HOOK_PATH))
            .respond_with(response)
            .expect(times)
            .mount(&self.http_mock)
            .await;
    }

    /// Mounts `response` for the next single report webhook call only.
    pub async fn mock_report_webhook_once(&self, response: ResponseTemplate) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path(REPORT_HOOK_PATH))
            .respond_with(response)
            .up_to_n_times(1)
            .expect(1)
            .mount(&self.http_mock)
            .await;
    }

    /// Mounts `response` on the signup webhook, expecting `times` calls.
    pub async fn mock_signup_webhook(&self, response: ResponseTemplate, times: u64) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path(SIGNUP_HOOK_PATH))
            .respond_with(response)
            .expect(times)
            .mount(&self.http_mock)
            .await;
    }

    /// Serves `emails` from the spreadsheet values endpoint, one per row in
    /// column B under a header row.
    pub async fn mock_sheet_rows(&self, emails: &[&str]) {
        let mut values = vec![json!(["Timestamp", "Email", "Source"])];
        values.extend(
            emails.iter().map(|email| json!(["2024-01-01T00:00:00Z", email, "waitlist"])),
        );

        Mock::given(matchers::method("GET"))
            .and(matchers::path_regex(values_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": values })))
            .mount(&self.http_mock)
            .await;
    }

    /// Mounts `response` on the spreadsheet read endpoint.
    pub async fn mock_sheet_read(&self, response: ResponseTemplate) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path_regex(values_path()))
            .respond_with(response)
            .mount(&self.http_mock)
            .await;
    }

    /// Mounts `response` on the spreadsheet append endpoint, expecting
    /// `times` calls.
    pub async fn mock_sheet_append(&self, response: ResponseTemplate, times: u64) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path_regex(format!("{}:append$", values_prefix())))
            .respond_with(response)
            .expect(times)
            .mount(&self.http_mock)
            .await;
    }

    /// JSON bodies the report webhook received, in order. Multipart
    /// deliveries yield their `payload_json` part.
    pub async fn report_deliveries(&self) -> Vec<Value> {
        self.received_on(REPORT_HOOK_PATH)
            .await
            .iter()
            .filter_map(|request| delivered_json(&request.body))
            .collect()
    }

    /// JSON bodies the signup webhook received, in order.
    pub async fn signup_deliveries(&self) -> Vec<Value> {
        self.received_on(SIGNUP_HOOK_PATH)
            .await
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

fn values_prefix() -> String {
    format!(r"^/v4/spreadsheets/{SPREADSHEET_ID}/values/.+")
}

fn values_path() -> String {
    format!(r"^/v4/spreadsheets/{SPREADSHEET_ID}/values/[^:]+$")
}

fn delivered_json(body: &[u8]) -> Option<Value> {
    if let Ok(value) = serde_json::from_slice(body) {
        return Some(value);
    }

    // Multipart: the JSON part is the first `{` after the payload_json name.
    let text = String::from_utf8_lossy(body);
    let start = text.find("name=\"payload_json\"")?;
    let rest = &text[start..];
    let json_start = rest.find('{')?;
    let mut stream = serde_json::Deserializer::from_str(&rest[json_start..]).into_iter::<Value>();
    stream.next()?.ok()
}

/// Builds a JSON request from the default test client.
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    client_request(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid test request")
}

/// Builds a request with an arbitrary body and content type from the
/// default test client.
pub fn raw_request(
    method: Method,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> Request<Body> {
    client_request(method, uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .expect("valid test request")
}

/// Request builder carrying the default client identity headers.
pub fn client_request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", TEST_CLIENT_IP)
        .header(header::USER_AGENT, TEST_USER_AGENT)
}

/// Replaces the forwarded client address on `request`.
#[must_use]
pub fn from_client(mut request: Request<Body>, address: &str) -> Request<Body> {
    if let Ok(value) = address.parse() {
        request.headers_mut().insert("x-forwarded-for", value);
    }
    request
}
