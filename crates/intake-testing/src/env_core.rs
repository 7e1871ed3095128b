//! Core TestEnv construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use intake_api::{AppState, Config};
use intake_delivery::MemorySignupStore;
use wiremock::MockServer;

use crate::{
    TestClock, TestEnv, REPORT_HOOK_PATH, SIGNUP_HOOK_PATH, SPREADSHEET_ID, START_EPOCH_MS,
};

/// Which signup store the environment wires in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// No store configured.
    None,
    /// In-memory store seeded with emails.
    Memory(Vec<String>),
    /// Spreadsheet store pointed at the mock server.
    Sheets,
}

/// Builder for configuring a [`TestEnv`].
pub struct TestEnvBuilder {
    report_webhook: bool,
    signup_webhook: bool,
    store: StoreMode,
    rate_limit_max_requests: usize,
    max_attachment_bytes: usize,
    allowed_attachment_types: Option<String>,
    min_form_fill_ms: i64,
    delivery_timeout_seconds: u64,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self {
            report_webhook: true,
            signup_webhook: true,
            store: StoreMode::Memory(Vec::new()),
            rate_limit_max_requests: 5,
            max_attachment_bytes: 1024,
            allowed_attachment_types: None,
            min_form_fill_ms: 3000,
            delivery_timeout_seconds: 5,
        }
    }
}

impl TestEnvBuilder {
    /// Creates a builder with both webhooks and an empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves the report webhook URL unset.
    #[must_use]
    pub fn without_report_webhook(mut self) -> Self {
        self.report_webhook = false;
        self
    }

    /// Leaves the signup webhook URL unset.
    #[must_use]
    pub fn without_signup_webhook(mut self) -> Self {
        self.signup_webhook = false;
        self
    }

    /// Selects the signup store.
    #[must_use]
    pub fn store(mut self, store: StoreMode) -> Self {
        self.store = store;
        self
    }

    /// Seeds an in-memory store with `emails`.
    #[must_use]
    pub fn existing_signups<I, S>(self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store(StoreMode::Memory(emails.into_iter().map(Into::into).collect()))
    }

    /// Sets the per-window report cap (default: 5).
    #[must_use]
    pub fn rate_limit(mut self, max_requests: usize) -> Self {
        self.rate_limit_max_requests = max_requests;
        self
    }

    /// Sets the attachment cap (default: 1024 bytes).
    #[must_use]
    pub fn max_attachment_bytes(mut self, bytes: usize) -> Self {
        self.max_attachment_bytes = bytes;
        self
    }

    /// Overrides the attachment MIME allow-list.
    #[must_use]
    pub fn allowed_attachment_types(mut self, types: impl Into<String>) -> Self {
        self.allowed_attachment_types = Some(types.into());
        self
    }

    /// Sets the minimum form fill time (default: 3000 ms).
    #[must_use]
    pub fn min_form_fill_ms(mut self, ms: i64) -> Self {
        self.min_form_fill_ms = ms;
        self
    }

    /// Sets the outbound call timeout (default: 5 s).
    #[must_use]
    pub fn delivery_timeout_seconds(mut self, seconds: u64) -> Self {
        self.delivery_timeout_seconds = seconds;
        self
    }

    /// Starts the mock server and builds the environment.
    pub async fn build(self) -> Result<TestEnv> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
            )
            .with_test_writer()
            .try_init();

        let http_mock = MockServer::start().await;
        let clock = TestClock::at_epoch_millis(START_EPOCH_MS);
        let uri = http_mock.uri();

        let defaults = Config::default();
        let config = Config {
            report_webhook_url: self.report_webhook.then(|| format!("{uri}{REPORT_HOOK_PATH}")),
            signup_webhook_url: self.signup_webhook.then(|| format!("{uri}{SIGNUP_HOOK_PATH}")),
            rate_limit_max_requests: self.rate_limit_max_requests,
            rate_limit_prune_probability: 0.0,
            max_attachment_bytes: self.max_attachment_bytes,
            allowed_attachment_types: self
                .allowed_attachment_types
                .unwrap_or_else(|| defaults.allowed_attachment_types.clone()),
            min_form_fill_ms: self.min_form_fill_ms,
            delivery_timeout_seconds: self.delivery_timeout_seconds,
            support_email: "support@example.com".to_string(),
            sheets_api_base: format!("{uri}/v4"),
            sheets_spreadsheet_id: (self.store == StoreMode::Sheets)
                .then(|| SPREADSHEET_ID.to_string()),
            sheets_access_token: (self.store == StoreMode::Sheets)
                .then(|| "test-token".to_string()),
            ..defaults
        };

        let mut state = AppState::new(config, Arc::new(clock.clone()))
            .context("failed to build application state")?;

        let memory_store = match self.store {
            StoreMode::Memory(emails) => {
                let store = MemorySignupStore::with_emails(emails);
                state = state.with_signup_store(Arc::new(store.clone()));
                Some(store)
            },
            StoreMode::None | StoreMode::Sheets => None,
        };

        Ok(TestEnv { http_mock, clock, memory_store, state })
    }
}
