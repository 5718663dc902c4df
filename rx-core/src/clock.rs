//! Clock abstraction for deterministic time handling
//!
//! Token expiry, rate-limit windows, and cache TTLs all read time through an
//! injected [`Clock`] so that expiry behavior is testable without sleeping.
//!
//! - **Production**: use [`SystemClock`]
//! - **Tests**: use [`MockClock`] and drive time with `advance()`

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for TTL and window arithmetic
    fn now(&self) -> Instant;

    /// Wall-clock time, used for audit records and API payloads
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time sources
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for tests
///
/// Starts at construction time and only moves when `advance()` is called.
#[derive(Debug)]
pub struct MockClock {
    base_instant: Instant,
    base_utc: DateTime<Utc>,
    offset: RwLock<Duration>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            base_instant: Instant::now(),
            base_utc: Utc::now(),
            offset: RwLock::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `delta`
    pub fn advance(&self, delta: Duration) {
        *self.offset.write() += delta;
    }

    /// Total time advanced since construction
    pub fn elapsed(&self) -> Duration {
        *self.offset.read()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base_instant + *self.offset.read()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.base_utc
            + chrono::Duration::from_std(*self.offset.read()).unwrap_or(chrono::Duration::zero())
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;
