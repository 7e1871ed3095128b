//! Error taxonomy for the signup and report handlers.
//!
//! Errors carry a stable code for log correlation and map onto an HTTP
//! status. Client input errors (`E1xxx`) get specific messages. Abuse
//! signals (`E2xxx`) render deliberately generic messages so the response
//! never reveals which check fired. Dependency errors (`E3xxx`) and internal
//! failures (`E9999`) are surfaced with a manual fallback by the API layer.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`IntakeError`].
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Which bot filter rejected a submission. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotSignal {
    /// The hidden honeypot field was populated.
    Honeypot,
    /// The form was submitted faster than a human could fill it.
    TooFast,
}

impl fmt::Display for BotSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Honeypot => write!(f, "honeypot"),
            Self::TooFast => write!(f, "too_fast"),
        }
    }
}

/// Errors produced while accepting a signup or a bug report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    // Client input errors (E1001-E1008)
    /// Signup submitted without an email (E1001).
    #[error("Email is required")]
    MissingEmail,

    /// Request body is not valid JSON for the expected schema (E1002).
    #[error("Invalid JSON body: {reason}")]
    InvalidJson {
        /// Parser error description
        reason: String,
    },

    /// Content type is neither JSON nor multipart (E1003).
    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType {
        /// Content type sent by the client
        content_type: String,
    },

    /// Report summary shorter than the minimum after trimming (E1004).
    #[error("Summary must be at least {min_chars} characters")]
    SummaryTooShort {
        /// Minimum accepted length in characters
        min_chars: usize,
    },

    /// Attachment grew past the byte cap while streaming (E1005).
    #[error("Attachment exceeds the {limit_bytes} byte limit")]
    AttachmentTooLarge {
        /// Configured cap in bytes
        limit_bytes: usize,
    },

    /// Attachment declared a MIME type outside the allow-list (E1006).
    #[error("Attachment type {content_type} is not allowed")]
    AttachmentTypeNotAllowed {
        /// Declared MIME type
        content_type: String,
    },

    /// Multipart stream could not be read (E1007).
    #[error("Malformed multipart body: {reason}")]
    MalformedMultipart {
        /// Parser error description
        reason: String,
    },

    /// Endpoint called with a method other than POST (E1008).
    #[error("Method not allowed")]
    MethodNotAllowed,

    // Abuse signals (E2001-E2002)
    /// A bot filter fired (E2001). Display stays generic.
    #[error("Invalid submission")]
    SuspectedBot {
        /// Filter that fired, for logs only
        signal: BotSignal,
    },

    /// Client exceeded the sliding-window request cap (E2002).
    #[error("Too many requests")]
    RateLimited {
        /// Epoch milliseconds at which the oldest request leaves the window
        reset_at_ms: i64,
    },

    // Dependency errors (E3001-E3002)
    /// No webhook URL configured for report delivery (E3001).
    #[error("Report delivery is not configured")]
    WebhookNotConfigured,

    /// Webhook delivery failed after the allowed attempts (E3002).
    #[error("Failed to deliver report")]
    DeliveryFailed {
        /// Underlying delivery error, for logs only
        reason: String,
    },

    /// Unexpected failure (E9999).
    #[error("Internal server error")]
    Internal(String),
}

impl IntakeError {
    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingEmail => "E1001",
            Self::InvalidJson { .. } => "E1002",
            Self::UnsupportedContentType { .. } => "E1003",
            Self::SummaryTooShort { .. } => "E1004",
            Self::AttachmentTooLarge { .. } => "E1005",
            Self::AttachmentTypeNotAllowed { .. } => "E1006",
            Self::MalformedMultipart { .. } => "E1007",
            Self::MethodNotAllowed => "E1008",
            Self::SuspectedBot { .. } => "E2001",
            Self::RateLimited { .. } => "E2002",
            Self::WebhookNotConfigured => "E3001",
            Self::DeliveryFailed { .. } => "E3002",
            Self::Internal(_) => "E9999",
        }
    }

    /// Returns the HTTP status code this error maps to.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed => 405,
            Self::RateLimited { .. } => 429,
            Self::WebhookNotConfigured | Self::DeliveryFailed { .. } | Self::Internal(_) => 500,
            _ => 400,
        }
    }

    /// Whether the caller should be offered the manual mailto fallback.
    pub const fn offers_fallback(&self) -> bool {
        matches!(
            self,
            Self::WebhookNotConfigured | Self::DeliveryFailed { .. } | Self::Internal(_)
        )
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(IntakeError::MissingEmail.code(), "E1001");
        assert_eq!(IntakeError::SummaryTooShort { min_chars: 5 }.code(), "E1004");
        assert_eq!(IntakeError::SuspectedBot { signal: BotSignal::Honeypot }.code(), "E2001");
        assert_eq!(IntakeError::RateLimited { reset_at_ms: 0 }.code(), "E2002");
        assert_eq!(IntakeError::WebhookNotConfigured.code(), "E3001");
        assert_eq!(IntakeError::Internal("boom".into()).code(), "E9999");
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(IntakeError::MissingEmail.status_code(), 400);
        assert_eq!(IntakeError::AttachmentTooLarge { limit_bytes: 1 }.status_code(), 400);
        assert_eq!(IntakeError::MethodNotAllowed.status_code(), 405);
        assert_eq!(IntakeError::RateLimited { reset_at_ms: 0 }.status_code(), 429);
        assert_eq!(IntakeError::DeliveryFailed { reason: "x".into() }.status_code(), 500);
    }

    #[test]
    fn bot_rejections_do_not_reveal_the_signal() {
        let honeypot = IntakeError::SuspectedBot { signal: BotSignal::Honeypot };
        let too_fast = IntakeError::SuspectedBot { signal: BotSignal::TooFast };

        assert_eq!(honeypot.to_string(), "Invalid submission");
        assert_eq!(honeypot.to_string(), too_fast.to_string());
    }

    #[test]
    fn only_dependency_failures_offer_fallback() {
        assert!(IntakeError::WebhookNotConfigured.offers_fallback());
        assert!(IntakeError::DeliveryFailed { reason: "503".into() }.offers_fallback());
        assert!(!IntakeError::SummaryTooShort { min_chars: 5 }.offers_fallback());
        assert!(!IntakeError::RateLimited { reset_at_ms: 0 }.offers_fallback());
    }
}
