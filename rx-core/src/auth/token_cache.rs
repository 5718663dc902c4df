//! Token cache with single-flight refresh

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::error::Result;

use super::TokenProvider;

/// Default safety margin subtracted from the token lifetime
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Configuration for the token cache
#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    /// A token is treated as expired this long before its real expiry, so a
    /// call never goes out with a token about to lapse mid-flight.
    pub safety_margin: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl TokenCacheConfig {
    /// Set the safety margin
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }
}

/// A cached OAuth2 bearer token
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone)]
pub struct Token {
    /// The bearer value sent in the Authorization header
    pub value: String,
    /// Instant past which the token must not be used
    pub expires_at: Instant,
    /// Granted scopes
    pub scopes: Vec<String>,
}

/// Caches one bearer token per client, refreshing on expiry
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    config: TokenCacheConfig,
    // The async mutex is held across the exchange await, which is what
    // serializes concurrent refreshes into a single flight.
    slot: tokio::sync::Mutex<Option<Token>>,
}

impl TokenCache {
    /// Create a cache with default configuration
    pub fn new(provider: Arc<dyn TokenProvider>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(TokenCacheConfig::default(), provider, clock)
    }

    /// Create with custom configuration
    pub fn with_config(
        config: TokenCacheConfig,
        provider: Arc<dyn TokenProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            clock,
            config,
            slot: tokio::sync::Mutex::new(None),
        }
    }

    /// Return a valid bearer token, refreshing if necessary
    ///
    /// The cached token is reused while `now < expires_at - safety_margin`.
    /// Callers who arrive during a refresh wait for it rather than starting
    /// their own exchange.
    pub async fn bearer_token(&self) -> Result<Token> {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref() {
            if self.still_fresh(token) {
                return Ok(token.clone());
            }
        }

        let grant = self.provider.exchange().await?;
        let token = Token {
            value: grant.access_token,
            expires_at: self.clock.now() + grant.expires_in,
            scopes: grant.scopes,
        };
        *slot = Some(token.clone());

        tracing::debug!(
            scopes = ?token.scopes,
            expires_in_secs = grant.expires_in.as_secs(),
            "refreshed bearer token"
        );

        Ok(token)
    }

    fn still_fresh(&self, token: &Token) -> bool {
        let deadline = token
            .expires_at
            .checked_sub(self.config.safety_margin)
            .unwrap_or(token.expires_at);
        self.clock.now() < deadline
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenGrant;
    use crate::clock::MockClock;
    use crate::error::RxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingProvider {
        exchanges: AtomicU64,
        expires_in: Duration,
        fail: bool,
        delay: Option<Duration>,
    }

    impl CountingProvider {
        fn new(expires_in: Duration) -> Self {
            Self {
                exchanges: AtomicU64::new(0),
                expires_in,
                fail: false,
                delay: None,
            }
        }

        fn failing() -> Self {
            Self {
                exchanges: AtomicU64::new(0),
                expires_in: Duration::from_secs(600),
                fail: true,
                delay: None,
            }
        }

        fn count(&self) -> u64 {
            self.exchanges.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn exchange(&self) -> crate::error::Result<TokenGrant> {
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(RxError::AuthFailure {
                    reason: "invalid_client".to_string(),
                });
            }
            Ok(TokenGrant {
                access_token: format!("token-{}", n),
                expires_in: self.expires_in,
                scopes: vec!["personal-demographics-service".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn test_token_cached_until_margin() {
        let clock = Arc::new(MockClock::new());
        let provider = Arc::new(CountingProvider::new(Duration::from_secs(600)));
        let cache = TokenCache::new(provider.clone(), clock.clone());

        let first = cache.bearer_token().await.unwrap();
        let second = cache.bearer_token().await.unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(provider.count(), 1);

        // Inside the lifetime but past the safety margin: refreshed
        clock.advance(Duration::from_secs(580));
        let third = cache.bearer_token().await.unwrap();
        assert_ne!(third.value, first.value);
        assert_eq!(provider.count(), 2);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes() {
        let clock = Arc::new(MockClock::new());
        let provider = Arc::new(CountingProvider::new(Duration::from_secs(100)));
        let cache = TokenCache::new(provider.clone(), clock.clone());

        cache.bearer_token().await.unwrap();
        clock.advance(Duration::from_secs(200));
        cache.bearer_token().await.unwrap();

        assert_eq!(provider.count(), 2);
    }

    #[tokio::test]
    async fn test_exchange_failure_surfaces_as_auth_error() {
        let clock = Arc::new(MockClock::new());
        let provider = Arc::new(CountingProvider::failing());
        let cache = TokenCache::new(provider, clock);

        match cache.bearer_token().await {
            Err(RxError::AuthFailure { reason }) => assert_eq!(reason, "invalid_client"),
            other => panic!("expected AuthFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_trigger_one_refresh() {
        let clock = Arc::new(MockClock::new());
        let provider = Arc::new(CountingProvider {
            exchanges: AtomicU64::new(0),
            expires_in: Duration::from_secs(600),
            fail: false,
            delay: Some(Duration::from_millis(20)),
        });
        let cache = Arc::new(TokenCache::new(provider.clone(), clock));

        let a = cache.clone();
        let b = cache.clone();
        let (ra, rb) = tokio::join!(
            async move { a.bearer_token().await },
            async move { b.bearer_token().await }
        );

        assert_eq!(ra.unwrap().value, rb.unwrap().value);
        assert_eq!(provider.count(), 1, "refresh must be single-flight");
    }
}
