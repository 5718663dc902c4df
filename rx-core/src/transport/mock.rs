//! Recording mock transport for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::Result;

use super::{ApiRequest, ApiResponse, HttpMethod, Transport};

struct Route {
    method: HttpMethod,
    path: String,
    response: ApiResponse,
}

/// Transport that serves canned responses and records every request
///
/// Routes are matched by method and exact path; later registrations win, so
/// a test can override an earlier route to simulate state changes.
/// Unmatched requests get a FHIR-style 404 so accidental calls fail loudly
/// rather than hanging.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a 200 response for `method path`
    pub fn on(&self, method: HttpMethod, path: impl Into<String>, body: Value) -> &Self {
        self.on_status(method, path, 200, body)
    }

    /// Register a response with an explicit status
    pub fn on_status(
        &self,
        method: HttpMethod,
        path: impl Into<String>,
        status: u16,
        body: Value,
    ) -> &Self {
        self.routes.lock().push(Route {
            method,
            path: path.into(),
            response: ApiResponse::with_status(status, body),
        });
        self
    }

    /// Every request executed so far, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests executed
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests that hit a specific path
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = {
            let routes = self.routes.lock();
            routes
                .iter()
                .rev()
                .find(|r| r.method == request.method && r.path == request.path)
                .map(|r| r.response.clone())
        };

        self.requests.lock().push(request);

        Ok(response.unwrap_or_else(|| {
            ApiResponse::with_status(
                404,
                json!({
                    "resourceType": "OperationOutcome",
                    "issue": [{
                        "severity": "error",
                        "code": "not-found",
                        "diagnostics": "no mock route registered"
                    }]
                }),
            )
        }))
    }
}
