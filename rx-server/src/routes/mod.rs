//! HTTP route handlers

mod exemptions;
mod patients;
mod prescriptions;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use rx_core::RxError;

use crate::AppState;

/// Actor identity resolved from the session token, available to handlers
/// via request extensions
#[derive(Debug, Clone)]
pub struct Actor(pub String);

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// JSON error surface: `{error, message?}` plus optional headers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: Option<String>,
    headers: Vec<(HeaderName, String)>,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            message: None,
            headers: Vec::new(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "Unauthorized".to_string(),
            message: None,
            headers: Vec::new(),
        }
    }
}

impl From<RxError> for ApiError {
    fn from(err: RxError) -> Self {
        let mut headers = Vec::new();
        if let RxError::RateLimited { retry_after, .. } = &err {
            headers.push((
                HeaderName::from_static("retry-after"),
                retry_after.as_secs().max(1).to_string(),
            ));
            headers.push((
                HeaderName::from_static("x-ratelimit-remaining"),
                "0".to_string(),
            ));
        }

        Self {
            status: StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            error: err.error_code().to_string(),
            message: Some(err.to_string()),
            headers,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self.message {
            Some(message) => json!({"error": self.error, "message": message}),
            None => json!({"error": self.error}),
        };

        let mut response = (self.status, Json(body)).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Session authentication for every `/v1` route
///
/// Absent or unknown `X-Session-Token` gets a 401 before any handler runs;
/// a known token resolves to the actor recorded in audit entries.
async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("x-session-token")
        .and_then(|v| v.to_str().ok());

    let actor = presented.and_then(|token| {
        state
            .session_tokens
            .iter()
            .find(|s| s.token == token)
            .map(|s| s.actor.clone())
    });

    match actor {
        Some(actor) => {
            request.extensions_mut().insert(Actor(actor));
            next.run(request).await
        }
        None => ApiError::unauthorized().into_response(),
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/v1/exemptions/check", post(exemptions::check))
        .route("/v1/patients/:nhs_number", get(patients::get_patient))
        .route("/v1/prescriptions", get(prescriptions::list))
        .route("/v1/prescriptions/:id", get(prescriptions::get_prescription))
        .route("/v1/prescriptions/:id/cancel", post(prescriptions::cancel))
        .route("/v1/prescriptions/:id/complete", post(prescriptions::complete))
        .route("/v1/prescriptions/:id/validate", post(prescriptions::validate))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}
