//! Error types for NHS API operations
//!
//! This module provides a structured error handling system with:
//! - Typed error variants with descriptive messages
//! - Stable error codes for programmatic handling
//! - HTTP status code mapping for server integrations
//! - Error categories for grouping and filtering
//! - JSON serialization for API responses
//!
//! Upstream (NHS endpoint) status codes are preserved where the status is
//! meaningful to callers (404 Not Found, 400 Bad Request); everything else
//! maps to a gateway-side 5xx.
//!
//! # Example
//!
//! ```rust
//! use rx_core::error::{RxError, ErrorCategory};
//!
//! fn handle_error(err: RxError) {
//!     match err.category() {
//!         ErrorCategory::NotFound => println!("Resource not found"),
//!         ErrorCategory::Validation => println!("Invalid input"),
//!         ErrorCategory::RateLimit => println!("Slow down"),
//!         _ => println!("Other error"),
//!     }
//!
//!     let status = err.http_status_code();
//!
//!     if err.is_recoverable() {
//!         println!("Retry may succeed");
//!     }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for NHS API operations
pub type Result<T> = std::result::Result<T, RxError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input validation failed before any network cost (400)
    Validation,
    /// Credential exchange with the NHS identity service failed (502)
    Auth,
    /// Sliding-window ceiling exceeded (429)
    RateLimit,
    /// Local or upstream resource missing (404)
    NotFound,
    /// Resource state conflict, e.g. illegal status transition (409)
    Conflict,
    /// NHS endpoint returned an error or was unreachable (4xx/5xx passthrough)
    Upstream,
    /// Internal error on our side (500)
    Internal,
}

/// Errors that can occur in the NHS API interaction layer
///
/// All errors include:
/// - A human-readable error message
/// - A stable error code for programmatic handling
/// - A category for grouping
/// - An HTTP status code for server integrations
#[derive(Error, Debug)]
pub enum RxError {
    // ═══════════════════════════════════════════════════════════════════════
    // Input validation errors (rejected before any network/rate-limit cost)
    // ═══════════════════════════════════════════════════════════════════════

    /// NHS number is not exactly 10 digits or fails the modulus-11 checksum
    #[error("Invalid NHS number: {reason}. NHS numbers are exactly 10 digits with a modulus-11 check digit.")]
    InvalidNhsNumber { reason: String },

    /// A required request field was not supplied
    #[error("{field} is required")]
    MissingField { field: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Auth errors (OAuth2 credential exchange)
    // ═══════════════════════════════════════════════════════════════════════

    /// Token exchange with the NHS identity service failed
    #[error("Authentication failed: {reason}. Check the configured API credentials.")]
    AuthFailure { reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Rate limiting
    // ═══════════════════════════════════════════════════════════════════════

    /// Sliding-window ceiling for the category was exceeded
    #[error("Rate limit exceeded for category '{category}'. Retry after {} seconds.", retry_after.as_secs())]
    RateLimited {
        category: String,
        retry_after: Duration,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Upstream NHS endpoint errors
    // ═══════════════════════════════════════════════════════════════════════

    /// NHS endpoint returned a non-2xx response
    #[error("Upstream NHS endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Outbound call exceeded its bounded timeout
    #[error("Upstream call timed out after {} ms", timeout.as_millis())]
    UpstreamTimeout { timeout: Duration },

    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("Transport error: {message}")]
    Transport { message: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Domain errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Prescription does not exist
    #[error("Prescription not found: '{id}'")]
    PrescriptionNotFound { id: String },

    /// Patient record does not exist in PDS
    #[error("Patient not found for NHS number '{nhs_number}'")]
    PatientNotFound { nhs_number: String },

    /// Prescription status transition is not allowed
    #[error("Cannot transition prescription from '{from}' to '{to}'. Cancelled and completed prescriptions are terminal.")]
    InvalidTransition { from: String, to: String },

    /// Dispense blocked because one or more items are out of stock
    #[error("Stock unavailable for: {}", items.join(", "))]
    StockUnavailable { items: Vec<String> },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error that shouldn't happen
    #[error("Internal error: {reason}. This is a bug; please report it.")]
    Internal { reason: String },
}

impl RxError {
    /// Returns true if this error might succeed on retry
    ///
    /// Recoverable errors include rate limits (wait and retry) and upstream
    /// timeouts or transport failures (transient). Mutating calls are never
    /// retried automatically by this layer; the caller decides.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RxError::RateLimited { .. }
                | RxError::UpstreamTimeout { .. }
                | RxError::Transport { .. }
        )
    }

    /// Returns true if this error is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(self.http_status_code(), 400..=499)
    }

    /// Returns true if this error is a server error (5xx equivalent)
    pub fn is_server_error(&self) -> bool {
        matches!(self.http_status_code(), 500..=599)
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            RxError::InvalidNhsNumber { .. } | RxError::MissingField { .. } => {
                ErrorCategory::Validation
            }

            RxError::AuthFailure { .. } => ErrorCategory::Auth,

            RxError::RateLimited { .. } => ErrorCategory::RateLimit,

            RxError::PrescriptionNotFound { .. } | RxError::PatientNotFound { .. } => {
                ErrorCategory::NotFound
            }

            RxError::InvalidTransition { .. } | RxError::StockUnavailable { .. } => {
                ErrorCategory::Conflict
            }

            RxError::Upstream { .. }
            | RxError::UpstreamTimeout { .. }
            | RxError::Transport { .. }
            | RxError::Serialization(_) => ErrorCategory::Upstream,

            RxError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    ///
    /// Error codes are uppercase, underscore-separated identifiers that
    /// remain stable across versions. Use these for client-side error
    /// handling, logging, and alerting.
    pub fn error_code(&self) -> &'static str {
        match self {
            RxError::InvalidNhsNumber { .. } => "INVALID_NHS_NUMBER",
            RxError::MissingField { .. } => "MISSING_FIELD",
            RxError::AuthFailure { .. } => "AUTH_FAILURE",
            RxError::RateLimited { .. } => "RATE_LIMITED",
            RxError::Upstream { .. } => "UPSTREAM_ERROR",
            RxError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            RxError::Transport { .. } => "TRANSPORT_ERROR",
            RxError::PrescriptionNotFound { .. } => "PRESCRIPTION_NOT_FOUND",
            RxError::PatientNotFound { .. } => "PATIENT_NOT_FOUND",
            RxError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RxError::StockUnavailable { .. } => "STOCK_UNAVAILABLE",
            RxError::Serialization(_) => "SERIALIZATION_ERROR",
            RxError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error
    ///
    /// Upstream 404 and 400 are preserved verbatim since the status is
    /// meaningful to the caller; other upstream statuses map to 502.
    pub fn http_status_code(&self) -> u16 {
        match self {
            RxError::InvalidNhsNumber { .. } | RxError::MissingField { .. } => 400,

            RxError::PrescriptionNotFound { .. } | RxError::PatientNotFound { .. } => 404,

            RxError::InvalidTransition { .. } | RxError::StockUnavailable { .. } => 409,

            RxError::RateLimited { .. } => 429,

            RxError::Internal { .. } => 500,

            RxError::AuthFailure { .. }
            | RxError::Transport { .. }
            | RxError::Serialization(_) => 502,

            RxError::UpstreamTimeout { .. } => 504,

            RxError::Upstream { status, .. } => match status {
                400 | 404 => *status,
                _ => 502,
            },
        }
    }

    /// Converts this error to a JSON-serializable response object
    ///
    /// Returns a structure suitable for API error responses:
    /// ```json
    /// {
    ///   "error": "PRESCRIPTION_NOT_FOUND",
    ///   "message": "Prescription not found: 'rx-123'",
    ///   "category": "not_found",
    ///   "recoverable": false
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            category: self.category(),
            recoverable: self.is_recoverable(),
        }
    }
}

/// JSON-serializable error response for APIs
///
/// Follows the `{error, message}` surface exposed by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g., "RATE_LIMITED")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}
