//! Health check handlers for service monitoring.
//!
//! Every external collaborator is optional, so health reports which ones
//! are configured rather than probing them. A missing webhook degrades the
//! service but never makes it unavailable.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual collaborator checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Both webhooks configured
    Healthy,
    /// At least one webhook missing
    Degraded,
}

/// Per-collaborator configuration state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Report webhook
    pub report_webhook: ComponentStatus,
    /// Signup webhook
    pub signup_webhook: ComponentStatus,
    /// Spreadsheet signup store
    pub signup_store: ComponentStatus,
}

/// Whether a collaborator is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Settings present
    Configured,
    /// Settings absent
    Missing,
}

impl From<bool> for ComponentStatus {
    fn from(configured: bool) -> Self {
        if configured {
            Self::Configured
        } else {
            Self::Missing
        }
    }
}

impl HealthChecks {
    fn from_state(state: &AppState) -> Self {
        Self {
            report_webhook: state.config.report_webhook().is_some().into(),
            signup_webhook: state.config.signup_webhook().is_some().into(),
            signup_store: state.signup_store.is_some().into(),
        }
    }

    fn overall(&self) -> HealthStatus {
        if self.report_webhook == ComponentStatus::Configured
            && self.signup_webhook == ComponentStatus::Configured
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

/// Health check endpoint handler. Always 200.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let checks = HealthChecks::from_state(&state);
    let response = HealthResponse {
        status: checks.overall(),
        timestamp: DateTime::<Utc>::from(state.clock.now_system()),
        checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    debug!(
        status = ?response.status,
        report_webhook = ?response.checks.report_webhook,
        signup_webhook = ?response.checks.signup_webhook,
        signup_store = ?response.checks.signup_store,
        "Health check completed"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Liveness check endpoint.
///
/// Returns a simple response indicating the process is serving requests.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    debug!("Performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(state.clock.now_system()),
        "service": "intake"
    });

    (StatusCode::OK, Json(response)).into_response()
}
