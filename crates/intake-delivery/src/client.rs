//! HTTP client for chat-webhook delivery.
//!
//! Posts a [`WebhookMessage`] as JSON, or as `multipart/form-data` with the
//! message in `payload_json` and the file in `files[0]` when a report carries
//! an attachment. Responses are categorized into [`DeliveryError`] variants
//! so the retry policy can react to rate limiting.

use std::time::{Duration, Instant};

use chrono::Utc;
use intake_core::{Attachment, WebhookMessage};
use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::error::{DeliveryError, Result};

/// Response bodies are cut to this length before being kept for logs.
const MAX_LOGGED_BODY: usize = 1024;

/// Configuration for the webhook client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("intake/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 3,
            verify_tls: true,
        }
    }
}

/// Successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    /// HTTP status code (2xx).
    pub status_code: u16,
    /// Request duration.
    pub duration: Duration,
}

/// Client for posting messages to chat webhooks.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl WebhookClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Underlying connection pool, shared with the signup store.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Posts `message` to `url`, with `attachment` as a file part if given.
    ///
    /// # Errors
    ///
    /// - `NetworkError` / `Timeout` when no response arrives
    /// - `RateLimited` for 429, carrying the receiver's requested wait
    /// - `ClientError` / `ServerError` for other non-2xx statuses
    /// - `ConfigurationError` if the request cannot be built
    pub async fn send(
        &self,
        url: &str,
        message: &WebhookMessage,
        attachment: Option<&Attachment>,
    ) -> Result<DeliveryResponse> {
        let span = info_span!(
            "webhook_delivery",
            multipart = attachment.is_some(),
            status = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let request = self.client.post(url);
            let request = match attachment {
                Some(file) => request.multipart(multipart_body(message, file)?),
                None => request.json(message),
            };

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(duration_ms = start.elapsed().as_millis(), "request failed: {e}");
                    if e.is_timeout() {
                        return Err(DeliveryError::timeout(self.config.timeout.as_secs()));
                    }
                    if e.is_builder() {
                        return Err(DeliveryError::configuration(e.to_string()));
                    }
                    return Err(DeliveryError::network(e.to_string()));
                },
            };

            let status_code = response.status().as_u16();
            tracing::Span::current().record("status", status_code);

            if response.status().is_success() {
                let duration = start.elapsed();
                tracing::debug!(duration_ms = duration.as_millis(), "webhook accepted message");
                return Ok(DeliveryResponse { status_code, duration });
            }

            let header_wait = retry_after_from_headers(response.headers());
            let body = response.text().await.unwrap_or_default();

            match status_code {
                429 => {
                    let retry_after = header_wait.or_else(|| retry_after_from_body(&body));
                    tracing::warn!(
                        retry_after_ms = ?retry_after.map(|d| d.as_millis()),
                        "webhook rate limited"
                    );
                    Err(DeliveryError::rate_limited(retry_after))
                },
                400..=499 => {
                    tracing::warn!(status = status_code, "webhook rejected message");
                    Err(DeliveryError::client_error(status_code, truncate_body(body)))
                },
                _ => {
                    tracing::warn!(status = status_code, "webhook server error");
                    Err(DeliveryError::server_error(status_code, truncate_body(body)))
                },
            }
        }
        .instrument(span)
        .await
    }
}

fn multipart_body(message: &WebhookMessage, file: &Attachment) -> Result<Form> {
    let payload = serde_json::to_string(message)
        .map_err(|e| DeliveryError::configuration(format!("failed to encode message: {e}")))?;
    let part = Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| DeliveryError::configuration(format!("invalid attachment type: {e}")))?;

    Ok(Form::new().text("payload_json", payload).part("files[0]", part))
}

/// Reads `Retry-After` as seconds (integer or fractional) or an HTTP date.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc).signed_duration_since(Utc::now());
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Reads a `retry_after` field (seconds) from a JSON rate-limit body.
pub fn retry_after_from_body(body: &str) -> Option<Duration> {
    #[derive(Deserialize)]
    struct RateLimitBody {
        retry_after: f64,
    }

    let parsed: RateLimitBody = serde_json::from_str(body).ok()?;
    Duration::try_from_secs_f64(parsed.retry_after).ok()
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_LOGGED_BODY {
        let mut cut = MAX_LOGGED_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("... (truncated)");
    }
    body
}
