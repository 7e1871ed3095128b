//! Single-retry policy for rate-limited webhook deliveries.
//!
//! A report delivery gets at most two attempts. The second attempt only
//! happens when the receiver answered the first with a rate limit, and only
//! after waiting the interval it asked for. A receiver asking for longer than
//! the policy allows is not retried at all. The wait runs through the
//! [`Clock`] so tests observe it without sleeping.

use std::time::Duration;

use intake_core::{Attachment, Clock, WebhookMessage};
use serde::{Deserialize, Serialize};

use crate::{
    client::{DeliveryResponse, WebhookClient},
    error::{DeliveryError, Result},
};

/// Retry limits for one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Wait used when the receiver does not say how long to back off.
    pub default_retry_after: Duration,
    /// Longest wait the policy honors. Longer requested waits end the
    /// delivery instead.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            default_retry_after: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(5),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then send again.
    RetryAfter(Duration),
    /// Surface the failure.
    GiveUp {
        /// Why no further attempt is made
        reason: String,
    },
}

impl RetryPolicy {
    /// Decides whether attempt number `attempt` (1-based) earns another try.
    pub fn decide(&self, attempt: u32, error: &DeliveryError) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) reached", self.max_attempts),
            };
        }

        if !error.is_retryable() {
            return RetryDecision::GiveUp { reason: format!("non-retryable error: {error}") };
        }

        let wait = error.retry_after().unwrap_or(self.default_retry_after);
        if wait > self.max_retry_after {
            return RetryDecision::GiveUp {
                reason: format!(
                    "requested wait of {}ms exceeds the {}ms limit",
                    wait.as_millis(),
                    self.max_retry_after.as_millis()
                ),
            };
        }

        RetryDecision::RetryAfter(wait)
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Response to the successful attempt.
    pub response: DeliveryResponse,
}

/// Sends `message`, retrying per `policy` when the receiver rate limits.
///
/// # Errors
///
/// Returns the first attempt's error when it is not a rate limit, or
/// `RetriesExhausted` when the allowed attempts all failed.
pub async fn deliver_with_retry(
    client: &WebhookClient,
    clock: &dyn Clock,
    policy: &RetryPolicy,
    url: &str,
    message: &WebhookMessage,
    attachment: Option<&Attachment>,
) -> Result<DeliveryOutcome> {
    let mut attempt = 1;

    loop {
        let error = match client.send(url, message, attachment).await {
            Ok(response) => return Ok(DeliveryOutcome { attempts: attempt, response }),
            Err(error) => error,
        };

        match policy.decide(attempt, &error) {
            RetryDecision::RetryAfter(wait) => {
                tracing::info!(attempt, wait_ms = wait.as_millis(), "retrying after rate limit");
                clock.sleep(wait).await;
                attempt += 1;
            },
            RetryDecision::GiveUp { reason } => {
                tracing::warn!(attempt, %reason, "giving up on delivery");
                if attempt > 1 {
                    return Err(DeliveryError::retries_exhausted(attempt, &error));
                }
                return Err(error);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_on_first_attempt_waits_requested_interval() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::rate_limited(Some(Duration::from_millis(2500)));

        assert_eq!(policy.decide(1, &err), RetryDecision::RetryAfter(Duration::from_millis(2500)));
    }

    #[test]
    fn missing_interval_uses_default() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::rate_limited(None);

        assert_eq!(policy.decide(1, &err), RetryDecision::RetryAfter(Duration::from_secs(1)));
    }

    #[test]
    fn interval_at_limit_is_honored() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::rate_limited(Some(Duration::from_secs(5)));

        assert_eq!(policy.decide(1, &err), RetryDecision::RetryAfter(Duration::from_secs(5)));
    }

    #[test]
    fn interval_past_limit_gives_up() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::rate_limited(Some(Duration::from_secs(600)));

        assert!(matches!(policy.decide(1, &err), RetryDecision::GiveUp { .. }));
    }

    #[test]
    fn second_attempt_never_retries() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::rate_limited(None);

        assert!(matches!(policy.decide(2, &err), RetryDecision::GiveUp { .. }));
    }

    #[test]
    fn server_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let err = DeliveryError::server_error(502, "bad gateway");

        assert!(matches!(policy.decide(1, &err), RetryDecision::GiveUp { .. }));
    }
}
