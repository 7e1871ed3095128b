//! Test infrastructure for the intake relay.
//!
//! Provides a [`TestEnv`] that wires the real router to wiremock stand-ins
//! for the chat webhooks and the spreadsheet API, a deterministic clock,
//! and fixture builders for report and signup submissions.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use intake_api::{create_router, AppState, Config};
use intake_delivery::MemorySignupStore;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

pub mod fixtures;
pub mod http;

mod env_core;

pub use env_core::{StoreMode, TestEnvBuilder};
pub use fixtures::{MultipartBody, ReportBuilder, SignupBuilder};
pub use intake_core::{Clock, TestClock};

/// Path of the mocked report webhook.
pub const REPORT_HOOK_PATH: &str = "/hooks/report";
/// Path of the mocked signup webhook.
pub const SIGNUP_HOOK_PATH: &str = "/hooks/signup";
/// Spreadsheet id used by the mocked store.
pub const SPREADSHEET_ID: &str = "test-sheet";
/// Epoch milliseconds the test clock starts at.
pub const START_EPOCH_MS: u64 = 1_700_000_000_000;

/// Test environment running the real router against mocked collaborators.
pub struct TestEnv {
    /// HTTP mock server standing in for webhooks and the spreadsheet API
    pub http_mock: MockServer,
    /// Deterministic clock shared with the router
    pub clock: TestClock,
    /// In-memory signup store, when the environment uses one
    pub memory_store: Option<MemorySignupStore>,
    state: AppState,
}

/// Response captured from the router.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body, `Value::Null` when empty or not JSON
    pub body: Value,
}

impl TestEnv {
    /// Creates an environment with default settings.
    pub async fn new() -> anyhow::Result<Self> {
        TestEnvBuilder::new().build().await
    }

    /// Creates a builder.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::new()
    }

    /// Configuration the router runs with.
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Shared state the router runs with.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Router over this environment's state.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Sends one request through a fresh router.
    ///
    /// Rate-limit state lives in [`AppState`], so it persists across calls.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = match self.router().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap_or_default();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, headers, body }
    }

    /// Current test clock time in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.epoch_millis()
    }

    /// Full URL of the mocked report webhook.
    pub fn report_hook_url(&self) -> String {
        format!("{}{REPORT_HOOK_PATH}", self.http_mock.uri())
    }

    /// Full URL of the mocked signup webhook.
    pub fn signup_hook_url(&self) -> String {
        format!("{}{SIGNUP_HOOK_PATH}", self.http_mock.uri())
    }

    /// Requests the mock server received on `path`.
    pub async fn received_on(&self, path: &str) -> Vec<wiremock::Request> {
        self.http_mock
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .collect()
    }
}
