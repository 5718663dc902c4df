//! Sliding-window rate limiting per API category
//!
//! The NHS APIs enforce per-category request ceilings (e.g. the PDS allows
//! 600 requests per rolling 60 seconds). This module keeps our side of that
//! bargain: every outbound call first passes through [`RateLimiter::check`],
//! and a Limited decision short-circuits the call before any network cost.
//!
//! The window state lives behind the [`WindowStore`] seam so deployments can
//! back it with a shared external store; [`InMemoryWindowStore`] is the
//! in-process implementation. The store contract requires the
//! add+prune+count sequence to be atomic per category.
//!
//! **Failure policy: fail open.** If the backing store is unreachable the
//! check logs a warning and allows the request — availability of the
//! pharmacy workflow takes priority over strict rate enforcement.

mod store;

pub use store::{InMemoryWindowStore, StoreError, WindowSample, WindowStore};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;

/// Default sliding window duration
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default request ceiling per window
pub const DEFAULT_CEILING: u64 = 600;

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Trailing window duration
    pub window: Duration,
    /// Maximum requests allowed within the window
    pub ceiling: u64,
    /// How many Limited decisions to retain for inspection
    pub overflow_capacity: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            ceiling: DEFAULT_CEILING,
            overflow_capacity: 256,
        }
    }
}

impl RateLimiterConfig {
    /// Set the window duration
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the request ceiling
    pub fn with_ceiling(mut self, ceiling: u64) -> Self {
        self.ceiling = ceiling;
        self
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed
    Allowed {
        /// Requests left in the window after this one
        remaining: u64,
    },
    /// Ceiling exceeded; the external call must not be made
    Limited {
        /// Time until the oldest recorded request leaves the window
        retry_after: Duration,
        /// Configured ceiling
        limit: u64,
        /// Requests currently counted in the window
        current: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// A Limited decision retained for later inspection
#[derive(Debug, Clone)]
pub struct OverflowEntry {
    pub category: String,
    pub at: DateTime<Utc>,
    pub current: u64,
    pub limit: u64,
}

/// Sliding-window rate limiter per API category
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    config: RateLimiterConfig,
    overflow: Mutex<VecDeque<OverflowEntry>>,
}

impl RateLimiter {
    /// Create a limiter with default configuration
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(RateLimiterConfig::default(), store, clock)
    }

    /// Create with custom configuration
    pub fn with_config(
        config: RateLimiterConfig,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            overflow: Mutex::new(VecDeque::new()),
        }
    }

    /// Check whether a request in `category` may proceed, recording it
    ///
    /// The current timestamp is recorded, entries older than the window are
    /// pruned, and the remaining entries are counted — atomically per
    /// category, in one store operation. A count above the ceiling yields
    /// [`Decision::Limited`] with a retry hint.
    pub async fn check(&self, category: &str) -> Decision {
        let now = self.clock.now();

        let sample = match self
            .store
            .record_and_count(category, now, self.config.window)
            .await
        {
            Ok(sample) => sample,
            Err(err) => {
                // Fail open: the workflow matters more than the ceiling
                tracing::warn!(
                    category = %category,
                    error = %err,
                    "rate limit store unreachable; allowing request"
                );
                return Decision::Allowed {
                    remaining: self.config.ceiling,
                };
            }
        };

        if sample.count > self.config.ceiling {
            let retry_after = sample
                .oldest
                .map(|oldest| {
                    let leaves_at = oldest + self.config.window;
                    leaves_at.saturating_duration_since(now)
                })
                .unwrap_or(self.config.window);

            self.push_overflow(OverflowEntry {
                category: category.to_string(),
                at: self.clock.now_utc(),
                current: sample.count,
                limit: self.config.ceiling,
            });

            Decision::Limited {
                retry_after,
                limit: self.config.ceiling,
                current: sample.count,
            }
        } else {
            Decision::Allowed {
                remaining: self.config.ceiling - sample.count,
            }
        }
    }

    /// Limited decisions recorded so far, oldest first
    pub fn overflow_log(&self) -> Vec<OverflowEntry> {
        self.overflow.lock().iter().cloned().collect()
    }

    /// The configured ceiling
    pub fn ceiling(&self) -> u64 {
        self.config.ceiling
    }

    fn push_overflow(&self, entry: OverflowEntry) {
        let mut log = self.overflow.lock();
        if log.len() >= self.config.overflow_capacity {
            log.pop_front();
        }
        log.push_back(entry);
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("overflow_entries", &self.overflow.lock().len())
            .finish()
    }
}
