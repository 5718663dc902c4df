//! Reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, RxError};

use super::{ApiRequest, ApiResponse, HttpMethod, Transport};

/// Default bounded timeout for every outbound call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL the request paths are appended to
    pub base_url: String,
    /// Per-request timeout; a timed-out call surfaces as a retryable
    /// transient error rather than hanging
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport that performs real HTTP calls via reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Build a transport for the given endpoint
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RxError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .client
            .request(method, self.url_for(&request.path))
            .query(&request.query);

        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RxError::UpstreamTimeout {
                    timeout: self.config.timeout,
                }
            } else {
                RxError::Transport {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }
}
