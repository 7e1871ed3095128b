//! Integration tests for the spreadsheet-backed signup store.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use intake_core::{SignupRecord, SignupSource};
use intake_delivery::{MemorySignupStore, SheetsConfig, SheetsStore, SignupStore, StoreError};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> SheetsStore {
    SheetsStore::new(
        reqwest::Client::new(),
        SheetsConfig {
            api_base: format!("{}/v4", server.uri()),
            spreadsheet_id: "sheet-123".into(),
            range: "Signups!A:I".into(),
            access_token: "secret-token".into(),
        },
    )
}

fn record(email: &str) -> SignupRecord {
    SignupRecord {
        email: email.into(),
        submitted_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        source: SignupSource::Beta,
        name: Some("Ada".into()),
        platform: None,
        experience: None,
        first_tool: None,
        idea: None,
        path: Some("/beta".into()),
    }
}

#[tokio::test]
async fn reads_email_column_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path_regex(r"^/v4/spreadsheets/sheet-123/values/.+$"))
        .and(matchers::header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Signups!A1:I3",
            "majorDimension": "ROWS",
            "values": [
                ["Timestamp", "Email", "Source"],
                ["2024-01-01T00:00:00Z", "ada@example.com", "waitlist"],
                ["2024-01-02T00:00:00Z", "Grace@Example.com", "beta"]
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let emails = store(&server).existing_emails().await.unwrap();

    assert_eq!(emails, vec!["ada@example.com", "Grace@Example.com"]);
}

#[tokio::test]
async fn empty_sheet_has_no_emails() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "Signups!A1:I1"})))
        .mount(&server)
        .await;

    assert!(store(&server).existing_emails().await.unwrap().is_empty());
}

#[tokio::test]
async fn read_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = store(&server).existing_emails().await.unwrap_err();

    assert_eq!(err, StoreError::Status { status_code: 403, body: "forbidden".into() });
}

#[tokio::test]
async fn append_posts_one_raw_row() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path_regex(r"^/v4/spreadsheets/sheet-123/values/.+:append$"))
        .and(matchers::query_param("valueInputOption", "RAW"))
        .and(matchers::header("authorization", "Bearer secret-token"))
        .and(matchers::body_partial_json(json!({
            "values": [["2024-06-01T08:00:00Z", "Ada@Example.com", "beta", "Ada", "", "", "", "", "/beta"]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updates": {"updatedRows": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).append(&record("Ada@Example.com")).await.unwrap();
}

#[tokio::test]
async fn memory_store_reports_seeded_and_appended() {
    let store = MemorySignupStore::with_emails(["first@example.com"]);
    store.append(&record("second@example.com")).await.unwrap();

    assert_eq!(
        store.existing_emails().await.unwrap(),
        vec!["first@example.com", "second@example.com"]
    );
    assert_eq!(store.appended().await.len(), 1);
}
