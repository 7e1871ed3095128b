//! Error types for webhook delivery and the signup store.
//!
//! Delivery errors are categorized by what the receiver said so the retry
//! policy can tell a rate limit from a hard failure. Store errors are always
//! non-fatal to the caller and only ever end up in logs and the signup
//! response's debug block.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failure delivering a message to a chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Connection could not be established or was dropped.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// No response within the client timeout.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        timeout_seconds: u64,
    },

    /// Receiver answered 4xx (other than 429).
    #[error("client error: HTTP {status_code}")]
    ClientError {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Receiver answered 5xx.
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Receiver answered 429.
    #[error("rate limited by webhook")]
    RateLimited {
        /// Wait requested by the receiver, if it gave one
        retry_after: Option<Duration>,
    },

    /// Webhook URL missing or the request could not be built.
    #[error("invalid webhook configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// The allowed attempts were used up.
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Error from the final attempt
        last_error: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a client error from an HTTP response.
    pub fn client_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ClientError { status_code, body: body.into() }
    }

    /// Creates a server error from an HTTP response.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::ServerError { status_code, body: body.into() }
    }

    /// Creates a rate limit error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates a retries exhausted error wrapping the final failure.
    pub fn retries_exhausted(attempts: u32, last_error: &DeliveryError) -> Self {
        Self::RetriesExhausted { attempts, last_error: last_error.to_string() }
    }

    /// Whether the receiver asked us to back off and try again.
    ///
    /// Only a rate-limit response earns a retry. Timeouts and 5xx are
    /// surfaced immediately so the reporter gets the manual fallback while
    /// still on the page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Wait requested by the receiver.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status returned by the receiver, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ClientError { status_code, .. } | Self::ServerError { status_code, .. } => {
                Some(*status_code)
            },
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

/// Failure reading from or appending to the signup store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store credentials or identifiers are missing.
    #[error("signup store not configured")]
    NotConfigured,

    /// Request never produced a response.
    #[error("store request failed: {message}")]
    Request {
        /// Transport error message
        message: String,
    },

    /// Store answered with a non-success status.
    #[error("store returned HTTP {status_code}")]
    Status {
        /// HTTP status code
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Response body did not match the values API shape.
    #[error("unexpected store response: {message}")]
    InvalidResponse {
        /// Parser error message
        message: String,
    },
}
