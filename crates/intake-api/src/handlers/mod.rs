//! HTTP request handlers for the intake relay.
//!
//! Handlers follow one pattern: parse into a typed schema, validate into a
//! domain type, act, and answer with JSON. Failures become an
//! [`ErrorResponse`] carrying the stable error code from
//! [`IntakeError::code`]. Abuse signals keep their messages generic.
//!
//! - `signup` - signup recording and notification
//! - `report` - bug report intake and delivery
//! - `health` - health and liveness probes

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use intake_core::{IntakeError, TicketId};
use serde::Serialize;

pub mod health;
pub mod report;
pub mod signup;

pub use health::{health_check, liveness_check};
pub use report::submit_report;
pub use signup::submit_signup;

/// Error body shared by the API endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false`.
    pub ok: bool,
    /// Human-readable message.
    pub error: String,
    /// Error code from the taxonomy (E1001-E9999).
    pub code: &'static str,
    /// Epoch milliseconds when a rate-limited client may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<i64>,
    /// Ticket assigned before the failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<TicketId>,
    /// Manual escalation link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
}

impl ErrorResponse {
    /// Body for `error` without fallback details.
    pub fn from_error(error: &IntakeError) -> Self {
        let reset_at = match error {
            IntakeError::RateLimited { reset_at_ms } => Some(*reset_at_ms),
            _ => None,
        };

        Self {
            ok: false,
            error: error.to_string(),
            code: error.code(),
            reset_at,
            ticket_id: None,
            mailto: None,
        }
    }

    /// Attaches the ticket and mailto fallback.
    #[must_use]
    pub fn with_fallback(mut self, ticket_id: Option<TicketId>, mailto: String) -> Self {
        self.ticket_id = ticket_id;
        self.mailto = Some(mailto);
        self
    }
}

/// Renders `body` with the status `error` maps to.
pub(crate) fn create_error_response(error: &IntakeError, body: ErrorResponse) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Renders `error`, attaching the ticket and mailto link when the error
/// offers the manual fallback.
pub(crate) fn create_fallback_response(
    error: &IntakeError,
    ticket_id: Option<TicketId>,
    mailto: impl FnOnce() -> String,
) -> Response {
    let mut body = ErrorResponse::from_error(error);
    if error.offers_fallback() {
        body = body.with_fallback(ticket_id, mailto());
    }
    create_error_response(error, body)
}

/// Renders a 429 with a `Retry-After` header in whole seconds.
pub(crate) fn create_rate_limited_response(reset_at_ms: i64, now_ms: i64) -> Response {
    let error = IntakeError::RateLimited { reset_at_ms };
    let mut response = create_error_response(&error, ErrorResponse::from_error(&error));

    let wait_ms = reset_at_ms.saturating_sub(now_ms).max(0);
    let wait_secs = (wait_ms + 999) / 1000;
    if let Ok(value) = HeaderValue::from_str(&wait_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }

    response
}

/// Fallback for unsupported methods on the API routes.
pub async fn method_not_allowed() -> Response {
    let error = IntakeError::MethodNotAllowed;
    create_error_response(&error, ErrorResponse::from_error(&error))
}
