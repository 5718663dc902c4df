//! RX Server Binary
//!
//! HTTP server providing REST API access to the rx-core NHS clients.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 8430, NHS sandbox)
//! RX_SESSION_TOKEN=dev-token rx-server
//!
//! # Custom port and endpoint
//! RX_PORT=3000 RX_NHS_BASE_URL=https://sandbox.api.service.nhs.uk rx-server
//! ```

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rx_core::audit::TracingAuditSink;
use rx_core::auth::{ClientCredentialsConfig, ClientCredentialsProvider, TokenCache};
use rx_core::cache::ResponseCache;
use rx_core::client::{
    AlwaysInStock, BsaClient, ClientCore, EpsClient, SpineClient, StatusCheck,
};
use rx_core::clock::SystemClock;
use rx_core::limit::{InMemoryWindowStore, RateLimiter, RateLimiterConfig};
use rx_core::notify::TracingNotificationSink;
use rx_core::transport::{HttpTransport, HttpTransportConfig};
use rx_core::validate::{
    AllergyClassCheck, ContraindicationCheck, DosageCeilingCheck, DrugInteractionCheck,
    RuleCheck, ValidationService,
};
use rx_server::store::ClientBackedStore;
use rx_server::{AppState, RxServer, ServerConfig};

const DEFAULT_BASE_URL: &str = "https://sandbox.api.service.nhs.uk";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rx_server=info,rx_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get configuration from environment
    let port: u16 = std::env::var("RX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8430);

    let base_url =
        std::env::var("RX_NHS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let token_url = std::env::var("RX_TOKEN_URL")
        .unwrap_or_else(|_| format!("{}/oauth2/token", base_url));
    let client_id = std::env::var("RX_CLIENT_ID").unwrap_or_default();
    let client_secret = std::env::var("RX_CLIENT_SECRET").unwrap_or_default();

    let session_token = std::env::var("RX_SESSION_TOKEN")?;
    let session_actor =
        std::env::var("RX_SESSION_ACTOR").unwrap_or_else(|_| "pharmacist".to_string());

    // Real seams: system clock, reqwest transport, OAuth exchange
    let clock = Arc::new(SystemClock);
    let transport = Arc::new(HttpTransport::new(HttpTransportConfig::new(&base_url))?);
    let provider = Arc::new(ClientCredentialsProvider::new(ClientCredentialsConfig::new(
        token_url,
        client_id,
        client_secret,
    ))?);

    let core = Arc::new(ClientCore::new(
        transport,
        TokenCache::new(provider, clock.clone()),
        Arc::new(RateLimiter::with_config(
            RateLimiterConfig::default(),
            Arc::new(InMemoryWindowStore::new()),
            clock.clone(),
        )),
        Arc::new(ResponseCache::new(clock.clone())),
        Arc::new(TracingAuditSink),
        clock.clone(),
    ));

    let spine = Arc::new(SpineClient::new(core.clone()));
    let bsa = Arc::new(BsaClient::new(core.clone()));
    let eps = Arc::new(EpsClient::new(core.clone(), Arc::new(AlwaysInStock)));
    let status = Arc::new(StatusCheck::new(spine.clone(), bsa.clone(), clock));

    let checks: Vec<Arc<dyn RuleCheck>> = vec![
        Arc::new(AllergyClassCheck::with_default_classes()),
        Arc::new(DrugInteractionCheck::with_default_pairs()),
        Arc::new(DosageCeilingCheck::new(Default::default())),
        Arc::new(ContraindicationCheck::with_default_rules()),
    ];
    let validation = Arc::new(ValidationService::new(
        Arc::new(ClientBackedStore::new(eps.clone(), spine.clone())),
        checks,
        Arc::new(TracingNotificationSink),
        Arc::new(TracingAuditSink),
        Arc::new(SystemClock),
    ));

    let config = ServerConfig::builder()
        .port(port)
        .session_token(session_token, session_actor)
        .build();

    let state = Arc::new(AppState {
        spine,
        bsa,
        eps,
        status,
        validation,
        session_tokens: config.session_tokens.clone(),
    });

    tracing::info!("Starting RX Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Upstream base URL: {}", base_url);

    let server = RxServer::new(state, config);
    server.run().await?;

    Ok(())
}
