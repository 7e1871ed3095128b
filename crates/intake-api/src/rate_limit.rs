//! Sliding-window rate limiter for report submissions.
//!
//! The ledger maps a client identity to the timestamps of its recent
//! requests. It lives in process memory, so limits are per instance and
//! reset on restart.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

/// Rate limiter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Window length.
    pub window: Duration,
    /// Requests allowed per key within the window.
    pub max_requests: usize,
    /// Fraction of checks that also sweep expired keys.
    pub prune_probability: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window: Duration::from_secs(60), max_requests: 5, prune_probability: 0.01 }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request admitted and recorded.
    Allowed {
        /// Requests left in the current window.
        remaining: usize,
    },
    /// Request rejected. Nothing was recorded.
    Limited {
        /// Epoch milliseconds when the oldest recorded request expires.
        reset_at_ms: i64,
    },
}

impl RateLimitDecision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// In-memory sliding-window limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    ledger: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, ledger: Mutex::new(HashMap::new()) }
    }

    /// Window length in milliseconds.
    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Checks `key` at `now_ms`, recording the request when admitted.
    pub async fn check(&self, key: &str, now_ms: i64) -> RateLimitDecision {
        let window_ms = self.window_ms();
        let sweep = self.config.prune_probability > 0.0
            && rand::rng().random_bool(self.config.prune_probability.min(1.0));

        let mut ledger = self.ledger.lock().await;
        if sweep {
            let removed = prune_expired(&mut ledger, now_ms, window_ms);
            debug!(removed, remaining = ledger.len(), "pruned rate limit ledger");
        }

        let hits = ledger.entry(key.to_string()).or_default();
        drop_expired(hits, now_ms, window_ms);

        if hits.len() >= self.config.max_requests {
            let oldest = hits.front().copied().unwrap_or(now_ms);
            return RateLimitDecision::Limited { reset_at_ms: oldest.saturating_add(window_ms) };
        }

        hits.push_back(now_ms);
        RateLimitDecision::Allowed { remaining: self.config.max_requests - hits.len() }
    }

    #[cfg(test)]
    async fn prune(&self, now_ms: i64) -> usize {
        let mut ledger = self.ledger.lock().await;
        prune_expired(&mut ledger, now_ms, self.window_ms())
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.ledger.lock().await.len()
    }
}

fn drop_expired(hits: &mut VecDeque<i64>, now_ms: i64, window_ms: i64) {
    while hits.front().is_some_and(|&t| now_ms.saturating_sub(t) >= window_ms) {
        hits.pop_front();
    }
}

fn prune_expired(ledger: &mut HashMap<String, VecDeque<i64>>, now_ms: i64, window_ms: i64) -> usize {
    let before = ledger.len();
    ledger.retain(|_, hits| {
        drop_expired(hits, now_ms, window_ms);
        !hits.is_empty()
    });
    before - ledger.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig { prune_probability: 0.0, ..Default::default() })
    }

    #[tokio::test]
    async fn sixth_request_in_window_is_limited() {
        let limiter = limiter();
        let start = 1_700_000_000_000;

        for i in 0..5 {
            let decision = limiter.check("1.2.3.4|agent", start + i * 1000).await;
            assert_eq!(decision, RateLimitDecision::Allowed { remaining: 4 - i as usize });
        }

        let decision = limiter.check("1.2.3.4|agent", start + 5000).await;
        assert_eq!(decision, RateLimitDecision::Limited { reset_at_ms: start + 60_000 });
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("a", 0).await;
        }

        assert!(!limiter.check("a", 10).await.is_allowed());
        assert!(limiter.check("b", 10).await.is_allowed());
    }

    #[tokio::test]
    async fn window_slides() {
        let limiter = limiter();
        for i in 0..5 {
            limiter.check("a", i * 10_000).await;
        }

        assert!(!limiter.check("a", 59_999).await.is_allowed());
        // First request (t=0) has left the window.
        assert!(limiter.check("a", 60_000).await.is_allowed());
        assert!(!limiter.check("a", 60_001).await.is_allowed());
    }

    #[tokio::test]
    async fn rejected_requests_are_not_recorded() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.check("a", 0).await;
        }
        for _ in 0..10 {
            limiter.check("a", 1000).await;
        }

        assert!(limiter.check("a", 60_000).await.is_allowed());
    }

    #[tokio::test]
    async fn prune_removes_only_expired_keys() {
        let limiter = limiter();
        limiter.check("old", 0).await;
        limiter.check("fresh", 50_000).await;

        let removed = limiter.prune(70_000).await;

        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn certain_prune_sweeps_on_check() {
        let limiter =
            RateLimiter::new(RateLimitConfig { prune_probability: 1.0, ..Default::default() });
        limiter.check("old", 0).await;
        limiter.check("new", 120_000).await;

        assert_eq!(limiter.tracked_keys().await, 1);
    }
}
