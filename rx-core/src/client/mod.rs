//! NHS API client façades
//!
//! The sole egress point to the NHS-style FHIR endpoints. Every operation
//! follows the same per-call protocol, implemented once in [`ClientCore`]:
//!
//! 1. validate input shape (NHS numbers are parsed before anything else)
//! 2. consult the rate limiter for the operation's category; short-circuit
//!    on Limited without touching the network
//! 3. consult the response cache for idempotent GETs
//! 4. obtain a bearer token from the token cache
//! 5. perform the transport call; non-2xx becomes a typed upstream error
//! 6. on success, store GETs in the cache and emit an audit record
//! 7. return the FHIR-shaped resource, minimally normalized
//!
//! Three façades cover the NHS services:
//! - [`SpineClient`] — PDS patient lookup
//! - [`BsaClient`] — exemption (PECS) and eligibility checks
//! - [`EpsClient`] — prescription lifecycle, including the
//!   `active → completed` / `active → cancelled` state machine
//!
//! [`StatusCheck`] composes the read-only lookups concurrently for the
//! composite exemption-status endpoint.

mod bsa;
mod core;
mod eps;
mod spine;
mod status;

pub use bsa::{BsaClient, Eligibility, ExemptionStatus};
pub use self::core::ClientCore;
pub use eps::{AlwaysInStock, CancelReason, EpsClient, InMemoryStock, StockChecker};
pub use spine::SpineClient;
pub use status::{CompositeStatus, StatusCheck};

/// Rate-limit category for PDS patient lookups
pub const CATEGORY_PDS: &str = "pds";
/// Rate-limit category for exemption checks
pub const CATEGORY_PECS: &str = "pecs";
/// Rate-limit category for eligibility checks
pub const CATEGORY_ELIGIBILITY: &str = "eligibility";
/// Rate-limit category for EPS prescription operations
pub const CATEGORY_EPS: &str = "eps";
