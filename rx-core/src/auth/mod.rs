//! OAuth2 bearer token caching
//!
//! Each NHS API client holds one [`TokenCache`]. The cache returns the
//! current token while it is comfortably inside its lifetime and performs a
//! credential exchange through the [`TokenProvider`] seam when it is not.
//!
//! Refresh is serialized: concurrent callers finding an expired token
//! trigger at most one in-flight exchange, the rest wait for its result.

mod client_credentials;
mod token_cache;

pub use client_credentials::{ClientCredentialsConfig, ClientCredentialsProvider};
pub use token_cache::{Token, TokenCache, TokenCacheConfig};

use async_trait::async_trait;

use crate::error::Result;

/// Raw outcome of a credential exchange
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The bearer token value
    pub access_token: String,
    /// Lifetime reported by the identity service
    pub expires_in: std::time::Duration,
    /// Granted scopes
    pub scopes: Vec<String>,
}

/// Credential exchange seam
///
/// Production implementations talk to the NHS identity service; tests plug
/// in a canned provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Perform a credential exchange
    ///
    /// Failures surface as [`crate::error::RxError::AuthFailure`] and are
    /// not retried implicitly.
    async fn exchange(&self) -> Result<TokenGrant>;
}
