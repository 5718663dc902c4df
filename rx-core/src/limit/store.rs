//! Window store backends for the rate limiter

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Error from a window store backend
///
/// The limiter never propagates these; a store error means fail open.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// Result of an atomic record+prune+count operation
#[derive(Debug, Clone, Copy)]
pub struct WindowSample {
    /// Entries remaining in the window, including the one just recorded
    pub count: u64,
    /// Oldest entry still in the window
    pub oldest: Option<Instant>,
}

/// Backend holding the per-category request windows
///
/// The original deployment backs this with an external sorted-set store
/// shared across processes; [`InMemoryWindowStore`] is the in-process
/// equivalent. Implementations must make `record_and_count` atomic per
/// category — two concurrent calls must not under- or over-count.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record `now` for `category`, prune entries older than `window`, and
    /// return the resulting count and oldest surviving entry.
    async fn record_and_count(
        &self,
        category: &str,
        now: Instant,
        window: Duration,
    ) -> Result<WindowSample, StoreError>;
}

/// In-memory window store
///
/// One timestamp vector per category behind a single mutex, so the
/// add+prune+count sequence is trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn record_and_count(
        &self,
        category: &str,
        now: Instant,
        window: Duration,
    ) -> Result<WindowSample, StoreError> {
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(category.to_string()).or_default();

        timestamps.push(now);
        let window_start = now.checked_sub(window);
        if let Some(start) = window_start {
            timestamps.retain(|&t| t > start);
        }

        Ok(WindowSample {
            count: timestamps.len() as u64,
            oldest: timestamps.first().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_count_prunes_old_entries() {
        let store = InMemoryWindowStore::new();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();

        let s = store.record_and_count("pds", t0, window).await.unwrap();
        assert_eq!(s.count, 1);

        let s = store
            .record_and_count("pds", t0 + Duration::from_secs(30), window)
            .await
            .unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.oldest, Some(t0));

        // t0 entry has left the window by t0+61
        let s = store
            .record_and_count("pds", t0 + Duration::from_secs(61), window)
            .await
            .unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.oldest, Some(t0 + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_categories_do_not_share_windows() {
        let store = InMemoryWindowStore::new();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();

        store.record_and_count("pds", t0, window).await.unwrap();
        let s = store.record_and_count("eps", t0, window).await.unwrap();
        assert_eq!(s.count, 1);
    }
}
