//! RX Server - HTTP wrapper for RX Core
//!
//! This crate provides a REST API around the rx-core client layer,
//! enabling the dual-mode architecture:
//!
//! - **Mode 1 (Embedded)**: Use `rx-core` directly from a Rust workflow
//! - **Mode 2 (HTTP)**: Use this server from any stack via REST
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        RxServer                           │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │   rx-core: SpineClient / BsaClient / EpsClient      │  │
//! │  │   StatusCheck / ValidationService                   │  │
//! │  │            (all logic lives here)                   │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! │                           │                               │
//! │  ┌──────────────┬─────────┼────────────┬──────────────┐   │
//! │  ▼              ▼         ▼            ▼              ▼   │
//! │ /v1/exemptions /v1/patients  /v1/prescriptions  /health   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The server is a thin wrapper - all NHS client logic remains in
//! `rx-core`. Every `/v1` route requires a valid `X-Session-Token`.

pub mod routes;
pub mod store;
mod config;

pub use config::{ServerConfig, ServerConfigBuilder, SessionToken};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rx_core::client::{BsaClient, EpsClient, SpineClient, StatusCheck};
use rx_core::validate::ValidationService;

/// Shared application state
pub struct AppState {
    pub spine: Arc<SpineClient>,
    pub bsa: Arc<BsaClient>,
    pub eps: Arc<EpsClient>,
    pub status: Arc<StatusCheck>,
    pub validation: Arc<ValidationService>,
    /// Accepted session tokens, checked on every `/v1` request
    pub session_tokens: Vec<SessionToken>,
}

/// RX HTTP Server
///
/// Wraps the rx-core clients with HTTP endpoints.
///
/// # Example
///
/// ```rust,ignore
/// use rx_server::{RxServer, ServerConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = ServerConfig::builder()
///         .port(8430)
///         .session_token("dev-token", "pharmacist-01")
///         .build();
///
///     let server = RxServer::new(state, config);
///     server.run().await.unwrap();
/// }
/// ```
pub struct RxServer {
    state: Arc<AppState>,
    config: ServerConfig,
}

impl RxServer {
    /// Create a new server around constructed rx-core clients
    pub fn new(state: Arc<AppState>, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Build the Axum router with all routes
    pub fn router(&self) -> Router {
        let router = routes::create_router(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Get the socket address for the server
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();
        let addr = self.addr();

        tracing::info!("RX Server listening on http://{}", addr);
        tracing::info!("Endpoints:");
        tracing::info!("  GET  /health");
        tracing::info!("  POST /v1/exemptions/check");
        tracing::info!("  GET  /v1/patients/:nhs_number");
        tracing::info!("  GET  /v1/prescriptions");
        tracing::info!("  GET  /v1/prescriptions/:id");
        tracing::info!("  POST /v1/prescriptions/:id/cancel");
        tracing::info!("  POST /v1/prescriptions/:id/complete");
        tracing::info!("  POST /v1/prescriptions/:id/validate");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
