//! Short-TTL response caching
//!
//! Avoids duplicate NHS calls for idempotent GETs within a session. Entries
//! expire lazily: an expired entry is discarded on the read that finds it,
//! with no background sweep.
//!
//! Caches are explicitly constructed and injected into the clients rather
//! than living in module-level state, so each test gets its own instance.

mod response_cache;

pub use response_cache::{CacheStats, ResponseCache, ResponseCacheConfig};

use std::time::Duration;

use sha2::{Digest, Sha256};

/// Default TTL for cached NHS responses (5 minutes)
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(300);

/// Deterministic request signature used as the cache key
///
/// Hashes the operation name and its parameters so equivalent requests map to
/// the same entry regardless of construction site.
pub fn request_signature(operation: &str, params: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for (name, value) in params {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}
