//! Rule-based prescription validation
//!
//! [`ValidationService`] loads a prescription + patient snapshot, runs a set
//! of independent [`RuleCheck`]s concurrently (they are read-only and share
//! no state, so end-to-end latency is bounded by the slowest single check),
//! and aggregates any findings into one severity-ranked
//! [`ValidationResult`].
//!
//! Severity policy: the result severity is the maximum across issues, and
//! an allergy finding is always forced to Critical regardless of what the
//! check itself reported. This is deliberate conservative safety policy,
//! confirmed with the clinical owners — an allergy match must never be
//! downgraded by a mis-tuned check.
//!
//! A Critical result triggers exactly one notification. One audit record is
//! written per validation, valid or not, carrying the full issue list.

mod checks;

pub use checks::{
    AllergyClassCheck, ContraindicationCheck, DosageCeilingCheck, DrugInteractionCheck,
};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditAction, AuditCategory, AuditRecord, AuditSink};
use crate::clock::Clock;
use crate::error::{Result, RxError};
use crate::fhir::{MedicationRequest, Patient};
use crate::notify::{Notification, NotificationSink};

/// Clinical severity, ordered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Kind of clinical issue a check can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    DrugInteraction,
    Dosage,
    Allergy,
    Contraindication,
}

/// A positive finding reported by a rule check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    /// Entities involved (medication names, allergy entries, conditions)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
}

/// One issue within a validation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
}

/// Aggregated outcome of a validation run
///
/// `is_valid` holds iff `issues` is empty; `severity` is the maximum issue
/// severity, `None` when there are no issues. Created fresh per call and
/// immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub severity: Severity,
    pub issues: Vec<ValidationIssue>,
}

/// The patient context a rule check evaluates against
///
/// Carries clinical facts beyond the bare PDS resource: recorded allergies,
/// active conditions, and current medications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub patient: Patient,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
}

/// A pluggable pharmacological rule check
///
/// In a full deployment each implementation fronts an external rules
/// service; the bundled implementations in [`checks`] evaluate against
/// locally configured tables. Checks are read-only and independent, so the
/// service runs them concurrently.
#[async_trait]
pub trait RuleCheck: Send + Sync {
    /// Short name used in logs and audit details
    fn name(&self) -> &'static str;

    /// Evaluate the prescription against the patient snapshot
    ///
    /// `Ok(None)` means no finding.
    async fn check(
        &self,
        prescription: &MedicationRequest,
        patient: &PatientSnapshot,
    ) -> Result<Option<Finding>>;
}

/// Source of prescription + patient snapshots for validation
#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    /// Load the prescription and its patient context; `None` if unknown
    async fn load(&self, prescription_id: &str)
        -> Result<Option<(MedicationRequest, PatientSnapshot)>>;
}

/// Orchestrates the rule checks and aggregates their findings
pub struct ValidationService {
    store: Arc<dyn PrescriptionStore>,
    checks: Vec<Arc<dyn RuleCheck>>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl ValidationService {
    pub fn new(
        store: Arc<dyn PrescriptionStore>,
        checks: Vec<Arc<dyn RuleCheck>>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            checks,
            notifications,
            audit,
            clock,
        }
    }

    /// Validate a prescription by id
    ///
    /// Fails with [`RxError::PrescriptionNotFound`] if the prescription does
    /// not exist. A failing rule check propagates: a result must reflect a
    /// complete rule evaluation, never a partial one.
    pub async fn validate_prescription(
        &self,
        prescription_id: &str,
        actor: &str,
    ) -> Result<ValidationResult> {
        let (prescription, snapshot) = self
            .store
            .load(prescription_id)
            .await?
            .ok_or_else(|| RxError::PrescriptionNotFound {
                id: prescription_id.to_string(),
            })?;

        let outcomes = futures::future::join_all(
            self.checks
                .iter()
                .map(|check| check.check(&prescription, &snapshot)),
        )
        .await;

        let mut issues = Vec::new();
        for outcome in outcomes {
            if let Some(finding) = outcome? {
                issues.push(issue_from_finding(finding));
            }
        }

        let severity = issues
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::None);

        let result = ValidationResult {
            is_valid: issues.is_empty(),
            severity,
            issues,
        };

        if severity == Severity::Critical {
            let notification = Notification {
                severity,
                subject: format!("Critical validation finding for prescription {}", prescription_id),
                body: result
                    .issues
                    .iter()
                    .map(|i| i.description.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            };
            if let Err(err) = self.notifications.send(notification).await {
                tracing::warn!(error = %err, "notification sink failed");
            }
        }

        let record = AuditRecord::new(
            AuditAction::PrescriptionValidation,
            AuditCategory::Validation,
            actor,
            self.clock.now_utc(),
        )
        .with_resource(prescription_id)
        .with_details(json!({
            "isValid": result.is_valid,
            "severity": result.severity,
            "issues": &result.issues,
        }));
        if let Err(err) = self.audit.record(record).await {
            tracing::warn!(error = %err, "audit sink failed");
        }

        Ok(result)
    }
}

/// Allergy findings are forced to Critical, everything else passes through
fn issue_from_finding(finding: Finding) -> ValidationIssue {
    let severity = if finding.issue_type == IssueType::Allergy {
        Severity::Critical
    } else {
        finding.severity
    };

    ValidationIssue {
        issue_type: finding.issue_type,
        severity,
        description: finding.description,
        related: finding.related,
    }
}
