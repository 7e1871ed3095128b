//! Signup endpoint.
//!
//! Once the email is present the endpoint always answers 200. Store and
//! webhook trouble is reported through `success` and the `debug` object so
//! the landing page never shows an error for a backend hiccup.

use std::collections::HashSet;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use intake_core::{compose_signup_message, normalize_email, IntakeError, SignupRequest};
use intake_delivery::{DeliveryError, StoreError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Span};

use super::{create_error_response, ErrorResponse};
use crate::AppState;

/// Response for a handled signup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    /// Whether the notification reached the webhook.
    pub success: bool,
    /// Unique signups known, including this one.
    pub total_count: usize,
    /// Whether the email was already recorded.
    pub is_duplicate: bool,
    /// Non-fatal failures encountered along the way.
    pub debug: SignupDebug,
}

/// Diagnostics returned alongside a signup.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupDebug {
    /// Emails read from the store.
    pub existing_count: usize,
    /// Why the store could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_read_error: Option<String>,
    /// Why the new row could not be appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_write_error: Option<String>,
    /// Why the notification was not delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_error: Option<String>,
}

/// Handles `POST /api/signup`.
#[instrument(name = "submit_signup", skip_all, fields(source = tracing::field::Empty))]
pub async fn submit_signup(State(state): State<AppState>, body: Bytes) -> Response {
    let record = match serde_json::from_slice::<SignupRequest>(&body)
        .map_err(IntakeError::from)
        .and_then(|request| request.into_record(DateTime::<Utc>::from(state.clock.now_system())))
    {
        Ok(record) => record,
        Err(e) => {
            debug!(code = e.code(), error = %e, "Rejected signup");
            return create_error_response(&e, ErrorResponse::from_error(&e));
        },
    };
    Span::current().record("source", record.source.as_str());

    let mut diagnostics = SignupDebug::default();

    let existing = match &state.signup_store {
        Some(store) => store.existing_emails().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read existing signups");
            diagnostics.store_read_error = Some(e.to_string());
            Vec::new()
        }),
        None => {
            diagnostics.store_read_error = Some(StoreError::NotConfigured.to_string());
            Vec::new()
        },
    };
    diagnostics.existing_count = existing.len();

    let is_duplicate = record.is_duplicate_of(&existing);
    let mut known = existing;
    if !is_duplicate {
        if let Some(store) = &state.signup_store {
            if let Err(e) = store.append(&record).await {
                warn!(error = %e, "Failed to append signup");
                diagnostics.store_write_error = Some(e.to_string());
            }
        }
        known.push(record.email.clone());
    }
    let known = unique_emails(known);

    let message = compose_signup_message(&record, &known, is_duplicate);
    let delivered = match state.config.signup_webhook() {
        Some(url) => match state.webhook_client.send(url, &message, None).await {
            Ok(response) => {
                debug!(status = response.status_code, "Signup notification delivered");
                Ok(())
            },
            Err(e) => Err(e),
        },
        None => Err(DeliveryError::configuration("signup webhook URL not set")),
    };

    let success = match delivered {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Signup notification failed");
            diagnostics.webhook_error = Some(e.to_string());
            false
        },
    };

    info!(
        is_duplicate,
        total_count = known.len(),
        success,
        "Signup handled"
    );

    let response =
        SignupResponse { success, total_count: known.len(), is_duplicate, debug: diagnostics };
    (StatusCode::OK, Json(response)).into_response()
}

/// Drops later occurrences of an email, compared after normalization.
fn unique_emails(emails: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    emails.into_iter().filter(|email| seen.insert(normalize_email(email))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_emails_keeps_first_casing() {
        let emails = vec![
            "Ada@Example.com".to_string(),
            "grace@example.com".to_string(),
            " ada@example.com ".to_string(),
        ];

        assert_eq!(unique_emails(emails), vec!["Ada@Example.com", "grace@example.com"]);
    }

    #[test]
    fn empty_debug_serializes_count_only() {
        let json = serde_json::to_value(SignupDebug::default()).unwrap();

        assert_eq!(json, serde_json::json!({ "existingCount": 0 }));
    }
}
