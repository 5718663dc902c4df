//! HTTP transport seam for NHS endpoint calls
//!
//! The clients speak to NHS endpoints only through the [`Transport`] trait,
//! which lets tests substitute a recording mock and assert exactly which
//! calls were (or were not) made.
//!
//! - **Production**: [`HttpTransport`] (reqwest, bounded timeout)
//! - **Tests**: [`MockTransport`] (canned responses, recorded requests)

mod http;
mod mock;

pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// HTTP method subset the clients use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    /// Whether responses to this method are cacheable
    pub fn is_idempotent_get(&self) -> bool {
        matches!(self, Self::Get)
    }
}

/// An outbound request to an NHS endpoint
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the transport's base URL, e.g. `/Patient/9434765870`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer token attached as `Authorization: Bearer …`
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            bearer: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_bearer(mut self, bearer: impl Into<String>) -> Self {
        self.bearer = Some(bearer.into());
        self
    }
}

/// A raw response from an NHS endpoint
///
/// Status interpretation (2xx vs error mapping) happens in the client core,
/// not here, so mock and real transports behave identically.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam for NHS endpoint calls
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request and return the raw response
    ///
    /// Only transport-level failures (timeout, connection) are errors here;
    /// a non-2xx response is still `Ok`.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}
