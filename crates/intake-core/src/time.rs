//! Clock abstraction for rate-limit windows, bot timing and retry waits.
//!
//! Production code uses [`RealClock`]. Tests inject [`TestClock`], whose
//! `sleep` advances virtual time and records the requested duration so the
//! single retry against a rate-limited webhook can be asserted without
//! actually waiting.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Source of time for the relay.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Wall-clock time for timestamps.
    fn now_system(&self) -> SystemTime;

    /// Wall-clock time as milliseconds since the Unix epoch.
    fn epoch_millis(&self) -> i64 {
        let since_epoch = self.now_system().duration_since(UNIX_EPOCH).unwrap_or_default();
        i64::try_from(since_epoch.as_millis()).unwrap_or(i64::MAX)
    }

    /// Suspends the current task for `duration`.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Clock backed by the operating system and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Manually driven clock for tests.
///
/// Clones share state, so a clock handed to the router can be advanced from
/// the test body.
#[derive(Debug, Clone)]
pub struct TestClock {
    elapsed_ns: Arc<AtomicU64>,
    epoch_start_ms: u64,
    slept_ns: Arc<AtomicU64>,
    sleeps: Arc<AtomicU32>,
}

impl TestClock {
    /// Creates a clock starting at the current wall-clock time.
    pub fn new() -> Self {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self::at_epoch_millis(u64::try_from(since_epoch.as_millis()).unwrap_or(0))
    }

    /// Creates a clock starting at `epoch_ms` milliseconds after the epoch.
    pub fn at_epoch_millis(epoch_ms: u64) -> Self {
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            epoch_start_ms: epoch_ms,
            slept_ns: Arc::new(AtomicU64::new(0)),
            sleeps: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    /// Total duration requested through [`Clock::sleep`].
    pub fn total_slept(&self) -> Duration {
        Duration::from_nanos(self.slept_ns.load(Ordering::Acquire))
    }

    /// Number of [`Clock::sleep`] calls made.
    pub fn sleep_count(&self) -> u32 {
        self.sleeps.load(Ordering::Acquire)
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_system(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.epoch_start_ms) + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.slept_ns.fetch_add(ns, Ordering::AcqRel);
        self.sleeps.fetch_add(1, Ordering::AcqRel);
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}
