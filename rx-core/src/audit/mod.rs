//! Audit sink contract
//!
//! Every client call and every validation result is logged through an
//! [`AuditSink`]. The sink is fire-and-forget from the core's perspective:
//! a sink failure is logged and swallowed, it never fails the primary
//! operation.
//!
//! Actions and categories are closed enums shared between the client layer
//! and the sink contract, replacing the stringly-typed action names the
//! original system cast at call sites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What kind of resource an audit record concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Patient,
    Exemption,
    Eligibility,
    Prescription,
    Validation,
}

/// The operation an audit record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PatientLookup,
    ExemptionCheck,
    EligibilityCheck,
    PrescriptionFetch,
    PrescriptionSearch,
    StatusUpdate,
    PrescriptionCancel,
    PrescriptionComplete,
    PrescriptionValidation,
}

/// One audit log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record id
    pub id: String,
    /// When the operation happened
    pub timestamp: DateTime<Utc>,
    /// The operation performed
    pub action: AuditAction,
    /// Resource category
    pub category: AuditCategory,
    /// Who performed it (user or system identity)
    pub actor: String,
    /// The resource concerned, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Operation-specific payload (before/after for mutations, issue lists
    /// for validations)
    pub details: Value,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        category: AuditCategory,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            action,
            category,
            actor: actor.into(),
            resource_id: None,
            details: Value::Null,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Error from an audit sink; never propagated past the call site
#[derive(Debug, Clone)]
pub struct SinkError {
    pub message: String,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SinkError {}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record
    async fn record(&self, record: AuditRecord) -> Result<(), SinkError>;
}

/// Sink that emits each record as a structured log line
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), SinkError> {
        tracing::info!(
            target: "audit",
            id = %record.id,
            action = ?record.action,
            category = ?record.category,
            actor = %record.actor,
            resource_id = record.resource_id.as_deref().unwrap_or("-"),
            details = %record.details,
            "audit"
        );
        Ok(())
    }
}

/// Sink that retains records in memory for test inspection
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far, in order
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Records matching an action
    pub fn records_for(&self, action: AuditAction) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), SinkError> {
        self.records.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_sink_retains_records() {
        let sink = MemoryAuditSink::new();

        let record = AuditRecord::new(
            AuditAction::PatientLookup,
            AuditCategory::Patient,
            "pharmacist-01",
            Utc::now(),
        )
        .with_resource("9434765870")
        .with_details(json!({"cached": false}));

        sink.record(record).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor, "pharmacist-01");
        assert_eq!(records[0].resource_id.as_deref(), Some("9434765870"));
    }

    #[test]
    fn test_record_serialization_uses_snake_case_enums() {
        let record = AuditRecord::new(
            AuditAction::PrescriptionCancel,
            AuditCategory::Prescription,
            "system",
            Utc::now(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "prescription_cancel");
        assert_eq!(json["category"], "prescription");
    }
}
