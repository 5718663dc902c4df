//! Response cache with lazy TTL expiry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

use crate::clock::Clock;

use super::DEFAULT_RESPONSE_TTL;

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Default TTL applied when `set` is called without an explicit TTL
    pub default_ttl: Duration,
    /// Maximum number of entries before eviction kicks in
    pub max_entries: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_RESPONSE_TTL,
            max_entries: 1000,
        }
    }
}

impl ResponseCacheConfig {
    /// Set the default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum entry count
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    expires_at: Instant,
}

/// In-memory response cache keyed by request signature
///
/// Lifetime is process-wide; entries leave only via TTL expiry or eviction
/// when the cache is full. Not shared across processes.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: ResponseCacheConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Create a cache with default configuration
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(ResponseCacheConfig::default(), clock)
    }

    /// Create with custom configuration
    pub fn with_config(config: ResponseCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a cached response
    ///
    /// Returns `None` on a miss. An expired entry counts as a miss and is
    /// discarded on this read.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {} // expired, discard below
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Lazy expiry: drop the stale entry under the write lock
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| now >= e.expires_at) {
            entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response with the default TTL
    pub fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Store a response with an explicit TTL
    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            stored_at: now,
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write();

        if entries.len() >= self.config.max_entries && !entries.contains_key(key) {
            self.evict_expired(&mut entries, now);
            if entries.len() >= self.config.max_entries {
                self.evict_oldest(&mut entries);
            }
        }

        entries.insert(key.to_string(), entry);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn evict_expired(&self, entries: &mut HashMap<String, CacheEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        self.evictions
            .fetch_add((before - entries.len()) as u64, Ordering::Relaxed);
    }

    fn evict_oldest(&self, entries: &mut HashMap<String, CacheEntry>) {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, e)| e.stored_at)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        CacheStats {
            entries,
            max_entries: self.config.max_entries,
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Number of live entries (including not-yet-collected expired ones)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of entries
    pub entries: usize,
    /// Maximum entries allowed
    pub max_entries: usize,
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    /// Total evictions
    pub evictions: u64,
}
