//! Intake signup and bug-report relay.
//!
//! Main entry point. Loads configuration, initializes tracing and serves
//! the HTTP API until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::{Context, Result};
use intake_api::{AppState, Config};
use intake_core::RealClock;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config);

    info!("Starting intake relay");
    info!(
        report_webhook = %config.report_webhook_masked(),
        signup_webhook = %config.signup_webhook_masked(),
        signup_store = config.to_sheets_config().is_some(),
        allowed_origins = %config.allowed_origins,
        rate_limit = config.rate_limit_max_requests,
        rate_limit_window_seconds = config.rate_limit_window_seconds,
        max_attachment_bytes = config.max_attachment_bytes,
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let state = AppState::new(config, Arc::new(RealClock::new()))?;

    intake_api::start_server(state, addr).await.context("HTTP server failed")?;

    info!("Intake shutdown complete");
    Ok(())
}

/// Initializes tracing from `RUST_LOG`, falling back to the configured
/// filter. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing(config: &Config) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.rust_log))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs() {
        registry.with(fmt::layer().json().with_current_span(true).with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}
