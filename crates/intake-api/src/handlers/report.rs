//! Bug report endpoint.
//!
//! Request lifecycle:
//! 1. Rate-limit gate keyed by client address and user agent
//! 2. Body parsing by content type (JSON or streamed multipart)
//! 3. Bot filters (honeypot, fill time)
//! 4. Validation
//! 5. Ticket assignment and message composition
//! 6. Delivery with a single retry on webhook rate limiting
//!
//! Once a ticket exists, every failure answers 500 with a mailto link that
//! carries the same ticket id.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use intake_core::{
    compose_report_message, mailto_link, Attachment, IntakeError, ReportPayload,
    ReportSubmission, TicketId,
};
use intake_delivery::deliver_with_retry;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn, Span};

use super::{
    create_error_response, create_fallback_response, create_rate_limited_response, ErrorResponse,
};
use crate::{
    middleware::ClientIdentity,
    multipart::{parse_multipart, AttachmentLimits},
    rate_limit::RateLimitDecision,
    AppState,
};

const SUCCESS_MESSAGE: &str = "Thanks! Your report has been sent.";

/// Response for a delivered report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Always `true`.
    pub ok: bool,
    /// Ticket to quote in follow-ups.
    pub ticket_id: TicketId,
    /// Confirmation for the reporter.
    pub message: String,
}

/// Handles `POST /api/report`.
#[instrument(
    name = "submit_report",
    skip_all,
    fields(client = %identity.address, ticket_id = tracing::field::Empty)
)]
pub async fn submit_report(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    request: Request,
) -> Response {
    let now_ms = state.clock.epoch_millis();

    match state.rate_limiter.check(&identity.rate_limit_key(), now_ms).await {
        RateLimitDecision::Allowed { remaining } => {
            debug!(remaining, "Rate limit check passed");
        },
        RateLimitDecision::Limited { reset_at_ms } => {
            warn!(reset_at_ms, "Report rate limited");
            return create_rate_limited_response(reset_at_ms, now_ms);
        },
    }

    let limits = state.config.to_attachment_limits();
    let (payload, attachment) = match read_body(request, &state, &limits).await {
        Ok(parsed) => parsed,
        Err(e) => return reject(&e),
    };

    if let Err(e) = payload.screen(now_ms, state.config.min_form_fill_ms) {
        if let IntakeError::SuspectedBot { signal } = &e {
            warn!(%signal, "Report rejected by bot filter");
        }
        return reject(&e);
    }

    let submission = match payload.validate(attachment) {
        Ok(submission) => submission,
        Err(e) => return reject(&e),
    };

    let ticket = TicketId::generate();
    Span::current().record("ticket_id", ticket.as_str());
    info!(
        ticket_id = %ticket,
        has_attachment = submission.attachment.is_some(),
        "Report accepted"
    );

    deliver(&state, &ticket, &submission).await
}

async fn deliver(state: &AppState, ticket: &TicketId, submission: &ReportSubmission) -> Response {
    let Some(url) = state.config.report_webhook() else {
        error!(ticket_id = %ticket, "Report webhook URL not set");
        return fallback(state, &IntakeError::WebhookNotConfigured, ticket, submission);
    };

    let submitted_at = DateTime::<Utc>::from(state.clock.now_system());
    let message = compose_report_message(submission, ticket, submitted_at);

    match deliver_with_retry(
        &state.webhook_client,
        state.clock.as_ref(),
        &state.config.to_retry_policy(),
        url,
        &message,
        submission.attachment.as_ref(),
    )
    .await
    {
        Ok(outcome) => {
            info!(
                ticket_id = %ticket,
                attempts = outcome.attempts,
                status_code = outcome.response.status_code,
                duration_ms = u64::try_from(outcome.response.duration.as_millis()).unwrap_or(u64::MAX),
                "Report delivered"
            );
            let response = ReportResponse {
                ok: true,
                ticket_id: ticket.clone(),
                message: SUCCESS_MESSAGE.to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        },
        Err(e) => {
            error!(ticket_id = %ticket, error = %e, "Report delivery failed");
            let failure = IntakeError::DeliveryFailed { reason: e.to_string() };
            fallback(state, &failure, ticket, submission)
        },
    }
}

async fn read_body(
    request: Request,
    state: &AppState,
    limits: &AttachmentLimits,
) -> Result<(ReportPayload, Option<Attachment>), IntakeError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = axum::extract::Multipart::from_request(request, state)
            .await
            .map_err(|e| IntakeError::MalformedMultipart { reason: e.body_text() })?;
        parse_multipart(multipart, limits).await
    } else if content_type.starts_with("application/json") {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| IntakeError::InvalidJson { reason: e.body_text() })?;
        Ok((serde_json::from_slice(&body)?, None))
    } else {
        let content_type =
            if content_type.is_empty() { "none".to_string() } else { content_type };
        Err(IntakeError::UnsupportedContentType { content_type })
    }
}

fn reject(error: &IntakeError) -> Response {
    debug!(code = error.code(), error = %error, "Report rejected");
    create_error_response(error, ErrorResponse::from_error(error))
}

fn fallback(
    state: &AppState,
    error: &IntakeError,
    ticket: &TicketId,
    submission: &ReportSubmission,
) -> Response {
    create_fallback_response(error, Some(ticket.clone()), || {
        mailto_link(&state.config.support_email, Some(ticket), Some(submission))
    })
}
