//! OAuth2 client-credentials exchange against the NHS identity service

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, RxError};

use super::{TokenGrant, TokenProvider};

/// Connection details for the identity service token endpoint
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Exchange timeout, bounded like every other outbound call
    pub timeout: Duration,
}

impl ClientCredentialsConfig {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

/// [`TokenProvider`] performing a `client_credentials` grant over HTTP
pub struct ClientCredentialsProvider {
    client: reqwest::Client,
    config: ClientCredentialsConfig,
}

impl ClientCredentialsProvider {
    pub fn new(config: ClientCredentialsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RxError::AuthFailure {
                reason: format!("failed to build token client: {}", e),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn exchange(&self) -> Result<TokenGrant> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RxError::AuthFailure {
                reason: format!("token exchange failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RxError::AuthFailure {
                reason: format!("identity service returned {}", status.as_u16()),
            });
        }

        let body: TokenEndpointResponse =
            response.json().await.map_err(|e| RxError::AuthFailure {
                reason: format!("malformed token response: {}", e),
            })?;

        Ok(TokenGrant {
            access_token: body.access_token,
            expires_in: Duration::from_secs(body.expires_in),
            scopes: body
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // client_secret deliberately not printed
        f.debug_struct("ClientCredentialsProvider")
            .field("token_url", &self.config.token_url)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}
