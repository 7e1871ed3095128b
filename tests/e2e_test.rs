//! End-to-end tests over a real TCP listener.
//!
//! The router is served with connection info the way the binary serves it,
//! so client identity falls back to the peer address when no forwarding
//! headers are present.

use std::net::SocketAddr;

use anyhow::Result;
use intake_testing::{ReportBuilder, SignupBuilder, TestEnv};
use serde_json::Value;
use tokio::net::TcpListener;
use wiremock::ResponseTemplate;

async fn serve(env: &TestEnv) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = env.router().into_make_service_with_connect_info::<SocketAddr>();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn multipart_report_travels_to_webhook() -> Result<()> {
    let env = TestEnv::new().await?;
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;
    let base = serve(&env).await?;

    let payload = ReportBuilder::with_defaults().to_json().to_string();
    let form = reqwest::multipart::Form::new().text("payload", payload).part(
        "attachment",
        reqwest::multipart::Part::bytes(b"TypeError: x is undefined".to_vec())
            .file_name("console.txt")
            .mime_str("text/plain")?,
    );

    let response = reqwest::Client::new()
        .post(format!("{base}/api/report"))
        .header("user-agent", "Mozilla/5.0 (E2E)")
        .multipart(form)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["ok"], true);
    assert!(body["ticketId"].as_str().is_some_and(|t| !t.is_empty()));

    let requests = env.received_on(intake_testing::REPORT_HOOK_PATH).await;
    assert_eq!(requests.len(), 1);
    let delivered = String::from_utf8_lossy(&requests[0].body);
    assert!(delivered.contains("console.txt"));
    assert!(delivered.contains("TypeError: x is undefined"));
    Ok(())
}

#[tokio::test]
async fn peer_address_keys_the_rate_limit() -> Result<()> {
    let env = TestEnv::builder().rate_limit(1).build().await?;
    env.mock_report_webhook(ResponseTemplate::new(204), 1).await;
    let base = serve(&env).await?;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/api/report"))
        .json(&ReportBuilder::with_defaults().to_json())
        .send()
        .await?;
    assert_eq!(first.status(), 200);

    let second = client
        .post(format!("{base}/api/report"))
        .json(&ReportBuilder::with_defaults().to_json())
        .send()
        .await?;
    assert_eq!(second.status(), 429);
    assert_eq!(second.headers().get("retry-after").and_then(|v| v.to_str().ok()), Some("60"));

    let body: Value = second.json().await?;
    assert_eq!(body["code"], "E2002");
    Ok(())
}

#[tokio::test]
async fn signup_answers_allowed_origin() -> Result<()> {
    let env = TestEnv::new().await?;
    env.mock_signup_webhook(ResponseTemplate::new(200), 1).await;
    let base = serve(&env).await?;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/signup"))
        .header("origin", "http://localhost:3000")
        .json(&SignupBuilder::new("ada@example.com").source("waitlist").to_json())
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );

    let body: Value = response.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["isDuplicate"], false);
    Ok(())
}
