//! # RX Core - NHS API client layer for pharmacy automation
//!
//! RX Core sits between a pharmacy workflow application and the NHS APIs
//! (PDS, PECS/BSA, EPS) and provides:
//!
//! - **Façade clients** ([`SpineClient`], [`BsaClient`], [`EpsClient`]) that
//!   speak FHIR to the upstream services through a pluggable [`Transport`]
//! - **Shared call protocol** ([`ClientCore`]): per-category rate limiting,
//!   OAuth token reuse, response caching, and an audit record for every call
//! - **Clinical safety checks** ([`ValidationService`]): pluggable rules for
//!   allergies, interactions, dosage ceilings and contraindications
//!
//! ## Core Principle
//!
//! > Every API call is audited; every mutation is state-checked first.
//!
//! Callers never hold raw NHS number strings: [`NhsNumber`] validates the
//! mod-11 checksum at the boundary, so a malformed number can never reach
//! the network.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! use rx_core::audit::MemoryAuditSink;
//! use rx_core::auth::{TokenCache, TokenGrant, TokenProvider};
//! use rx_core::cache::ResponseCache;
//! use rx_core::client::{ClientCore, SpineClient};
//! use rx_core::clock::SystemClock;
//! use rx_core::limit::{InMemoryWindowStore, RateLimiter, RateLimiterConfig};
//! use rx_core::transport::{HttpMethod, MockTransport};
//! use rx_core::NhsNumber;
//!
//! // Token provider (production would exchange client credentials)
//! struct StaticProvider;
//!
//! #[async_trait]
//! impl TokenProvider for StaticProvider {
//!     async fn exchange(&self) -> rx_core::Result<TokenGrant> {
//!         Ok(TokenGrant {
//!             access_token: "token".to_string(),
//!             expires_in: Duration::from_secs(600),
//!             scopes: Vec::new(),
//!         })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rx_core::Result<()> {
//! let clock: Arc<SystemClock> = Arc::new(SystemClock);
//!
//! // A mock transport stands in for the NHS endpoints
//! let transport = Arc::new(MockTransport::new());
//! transport.on(
//!     HttpMethod::Get,
//!     "/Patient/9434765870",
//!     json!({"resourceType": "Patient", "id": "9434765870"}),
//! );
//!
//! let core = Arc::new(ClientCore::new(
//!     transport,
//!     TokenCache::new(Arc::new(StaticProvider), clock.clone()),
//!     Arc::new(RateLimiter::with_config(
//!         RateLimiterConfig::default(),
//!         Arc::new(InMemoryWindowStore::new()),
//!         clock.clone(),
//!     )),
//!     Arc::new(ResponseCache::new(clock.clone())),
//!     Arc::new(MemoryAuditSink::new()),
//!     clock,
//! ));
//!
//! // NHS numbers are checksum-validated before any call is made
//! let nhs = NhsNumber::parse("943 476 5870")?;
//!
//! let spine = SpineClient::new(core);
//! let patient = spine.get_patient_by_nhs_number(&nhs, "pharmacist-01").await?;
//! assert_eq!(patient.id, "9434765870");
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod fhir;
pub mod limit;
pub mod nhs_number;
pub mod notify;
pub mod transport;
pub mod validate;

// Re-export main types
pub use client::{
    BsaClient, ClientCore, CompositeStatus, EpsClient, SpineClient, StatusCheck,
};
pub use error::{ErrorCategory, ErrorResponse, Result, RxError};
pub use fhir::{Bundle, MedicationRequest, Patient, PrescriptionStatus};
pub use nhs_number::NhsNumber;
pub use validate::{ValidationResult, ValidationService};
