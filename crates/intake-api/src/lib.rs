//! HTTP front door for the intake relay.
//!
//! Two public endpoints accept browser submissions:
//!
//! - `POST /api/signup` records a signup in the spreadsheet store and
//!   notifies the signup webhook. It always answers 200 once the email is
//!   present, flagging backend trouble in the body.
//! - `POST /api/report` rate-limits, parses JSON or multipart, screens for
//!   bots, validates and forwards a bug report to the report webhook. When
//!   delivery is impossible the caller gets a pre-filled mailto link.
//!
//! `GET /health` and `GET /live` serve monitoring.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Context;
use intake_core::Clock;
use intake_delivery::{SheetsStore, SignupStore, WebhookClient};

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod multipart;
pub mod rate_limit;
pub mod server;

pub use config::Config;
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use server::{create_router, start_server};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Time source for rate limiting, bot timing and retry waits.
    pub clock: Arc<dyn Clock>,
    /// Report rate-limit ledger.
    pub rate_limiter: Arc<RateLimiter>,
    /// Outbound webhook client.
    pub webhook_client: WebhookClient,
    /// Signup store, when one is configured.
    pub signup_store: Option<Arc<dyn SignupStore>>,
}

impl AppState {
    /// Builds state from configuration. The spreadsheet store is created
    /// only when its id and token are both present.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate()?;
        let webhook_client = WebhookClient::new(config.to_client_config())
            .context("Failed to build webhook client")?;
        let signup_store = config.to_sheets_config().map(|sheets| {
            Arc::new(SheetsStore::new(webhook_client.http().clone(), sheets))
                as Arc<dyn SignupStore>
        });
        let rate_limiter = Arc::new(RateLimiter::new(config.to_rate_limit_config()));

        Ok(Self { config: Arc::new(config), clock, rate_limiter, webhook_client, signup_store })
    }

    /// Replaces the signup store.
    #[must_use]
    pub fn with_signup_store(mut self, store: Arc<dyn SignupStore>) -> Self {
        self.signup_store = Some(store);
        self
    }
}
