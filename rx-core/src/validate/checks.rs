//! Bundled rule check implementations
//!
//! Each check evaluates against tables configured at construction. A real
//! deployment can swap any of them for an implementation backed by an
//! external pharmacological rules service; the [`RuleCheck`] contract is the
//! only coupling.
//!
//! Matching is case-insensitive substring matching on medication display
//! names, which is how the upstream dm+d display strings are keyed in the
//! configured tables.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::fhir::MedicationRequest;

use super::{Finding, IssueType, PatientSnapshot, RuleCheck, Severity};

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Flags prescriptions whose medication matches a recorded allergy class
///
/// Reports High on match; the validation service escalates allergy findings
/// to Critical regardless.
#[derive(Debug, Clone)]
pub struct AllergyClassCheck {
    /// medication fragment -> allergy class it belongs to
    classes: HashMap<String, String>,
}

impl AllergyClassCheck {
    pub fn new(classes: HashMap<String, String>) -> Self {
        Self { classes }
    }

    /// Table covering the common UK dispensing allergy classes
    pub fn with_default_classes() -> Self {
        let mut classes = HashMap::new();
        classes.insert("amoxicillin".to_string(), "penicillin".to_string());
        classes.insert("phenoxymethylpenicillin".to_string(), "penicillin".to_string());
        classes.insert("flucloxacillin".to_string(), "penicillin".to_string());
        classes.insert("ibuprofen".to_string(), "nsaid".to_string());
        classes.insert("naproxen".to_string(), "nsaid".to_string());
        classes.insert("aspirin".to_string(), "nsaid".to_string());
        Self::new(classes)
    }
}

#[async_trait]
impl RuleCheck for AllergyClassCheck {
    fn name(&self) -> &'static str {
        "allergy"
    }

    async fn check(
        &self,
        prescription: &MedicationRequest,
        patient: &PatientSnapshot,
    ) -> Result<Option<Finding>> {
        let Some(medication) = prescription.medication_display() else {
            return Ok(None);
        };

        for (fragment, class) in &self.classes {
            if !contains_ci(medication, fragment) {
                continue;
            }
            for allergy in &patient.allergies {
                if contains_ci(allergy, class) || contains_ci(allergy, fragment) {
                    return Ok(Some(Finding {
                        issue_type: IssueType::Allergy,
                        severity: Severity::High,
                        description: format!(
                            "{} belongs to the {} class, which matches the recorded allergy '{}'",
                            medication, class, allergy
                        ),
                        related: vec![medication.to_string(), allergy.clone()],
                    }));
                }
            }
        }

        Ok(None)
    }
}

/// Flags known interactions between the prescribed medication and the
/// patient's current medications
#[derive(Debug, Clone)]
pub struct DrugInteractionCheck {
    /// (fragment a, fragment b, severity, description)
    pairs: Vec<(String, String, Severity, String)>,
}

impl DrugInteractionCheck {
    pub fn new(pairs: Vec<(String, String, Severity, String)>) -> Self {
        Self { pairs }
    }

    /// A small table of well-known interactions
    pub fn with_default_pairs() -> Self {
        Self::new(vec![
            (
                "warfarin".to_string(),
                "aspirin".to_string(),
                Severity::High,
                "Increased bleeding risk".to_string(),
            ),
            (
                "methotrexate".to_string(),
                "trimethoprim".to_string(),
                Severity::Critical,
                "Risk of severe bone marrow suppression".to_string(),
            ),
            (
                "simvastatin".to_string(),
                "clarithromycin".to_string(),
                Severity::Medium,
                "Raised statin exposure; myopathy risk".to_string(),
            ),
        ])
    }
}

#[async_trait]
impl RuleCheck for DrugInteractionCheck {
    fn name(&self) -> &'static str {
        "interaction"
    }

    async fn check(
        &self,
        prescription: &MedicationRequest,
        patient: &PatientSnapshot,
    ) -> Result<Option<Finding>> {
        let Some(medication) = prescription.medication_display() else {
            return Ok(None);
        };

        for (a, b, severity, description) in &self.pairs {
            let other = if contains_ci(medication, a) {
                b
            } else if contains_ci(medication, b) {
                a
            } else {
                continue;
            };

            if let Some(current) = patient
                .current_medications
                .iter()
                .find(|m| contains_ci(m, other))
            {
                return Ok(Some(Finding {
                    issue_type: IssueType::DrugInteraction,
                    severity: *severity,
                    description: format!(
                        "{} interacts with current medication {}: {}",
                        medication, current, description
                    ),
                    related: vec![medication.to_string(), current.clone()],
                }));
            }
        }

        Ok(None)
    }
}

/// Flags dispense quantities above a configured per-medication ceiling
#[derive(Debug, Clone)]
pub struct DosageCeilingCheck {
    /// medication fragment -> maximum dispense quantity
    ceilings: HashMap<String, f64>,
}

impl DosageCeilingCheck {
    pub fn new(ceilings: HashMap<String, f64>) -> Self {
        Self { ceilings }
    }
}

#[async_trait]
impl RuleCheck for DosageCeilingCheck {
    fn name(&self) -> &'static str {
        "dosage"
    }

    async fn check(
        &self,
        prescription: &MedicationRequest,
        _patient: &PatientSnapshot,
    ) -> Result<Option<Finding>> {
        let Some(medication) = prescription.medication_display() else {
            return Ok(None);
        };
        let Some(quantity) = prescription
            .dispense_request
            .as_ref()
            .and_then(|d| d.quantity.as_ref())
        else {
            return Ok(None);
        };

        for (fragment, ceiling) in &self.ceilings {
            if contains_ci(medication, fragment) && quantity.value > *ceiling {
                return Ok(Some(Finding {
                    issue_type: IssueType::Dosage,
                    severity: Severity::High,
                    description: format!(
                        "Dispense quantity {} for {} exceeds the ceiling of {}",
                        quantity.value, medication, ceiling
                    ),
                    related: vec![medication.to_string()],
                }));
            }
        }

        Ok(None)
    }
}

/// Flags medications contraindicated by a recorded condition
#[derive(Debug, Clone)]
pub struct ContraindicationCheck {
    /// (medication fragment, condition fragment, description)
    rules: Vec<(String, String, String)>,
}

impl ContraindicationCheck {
    pub fn new(rules: Vec<(String, String, String)>) -> Self {
        Self { rules }
    }

    /// A small table of well-known contraindications
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            (
                "propranolol".to_string(),
                "asthma".to_string(),
                "Non-selective beta blockers can provoke bronchospasm".to_string(),
            ),
            (
                "ibuprofen".to_string(),
                "peptic ulcer".to_string(),
                "NSAIDs aggravate peptic ulcer disease".to_string(),
            ),
        ])
    }
}

#[async_trait]
impl RuleCheck for ContraindicationCheck {
    fn name(&self) -> &'static str {
        "contraindication"
    }

    async fn check(
        &self,
        prescription: &MedicationRequest,
        patient: &PatientSnapshot,
    ) -> Result<Option<Finding>> {
        let Some(medication) = prescription.medication_display() else {
            return Ok(None);
        };

        for (med_fragment, condition_fragment, description) in &self.rules {
            if !contains_ci(medication, med_fragment) {
                continue;
            }
            if let Some(condition) = patient
                .conditions
                .iter()
                .find(|c| contains_ci(c, condition_fragment))
            {
                return Ok(Some(Finding {
                    issue_type: IssueType::Contraindication,
                    severity: Severity::Medium,
                    description: format!(
                        "{} is contraindicated with {}: {}",
                        medication, condition, description
                    ),
                    related: vec![medication.to_string(), condition.clone()],
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::Patient;
    use serde_json::json;

    fn prescription(display: &str, quantity: Option<f64>) -> MedicationRequest {
        let mut body = json!({
            "resourceType": "MedicationRequest",
            "id": "rx-1",
            "status": "active",
            "medicationCodeableConcept": {"coding": [{"display": display}]}
        });
        if let Some(q) = quantity {
            body["dispenseRequest"] = json!({"quantity": {"value": q}});
        }
        serde_json::from_value(body).unwrap()
    }

    fn snapshot(
        allergies: &[&str],
        conditions: &[&str],
        current: &[&str],
    ) -> PatientSnapshot {
        let patient: Patient =
            serde_json::from_value(json!({"resourceType": "Patient", "id": "p1"})).unwrap();
        PatientSnapshot {
            patient,
            allergies: allergies.iter().map(|s| s.to_string()).collect(),
            conditions: conditions.iter().map(|s| s.to_string()).collect(),
            current_medications: current.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_allergy_class_match() {
        let check = AllergyClassCheck::with_default_classes();
        let rx = prescription("Amoxicillin 500mg capsules", None);
        let snap = snapshot(&["Penicillin"], &[], &[]);

        let finding = check.check(&rx, &snap).await.unwrap().unwrap();
        assert_eq!(finding.issue_type, IssueType::Allergy);
        assert!(finding.related.contains(&"Penicillin".to_string()));

        // No allergy recorded, no finding
        let clear = snapshot(&[], &[], &[]);
        assert!(check.check(&rx, &clear).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interaction_match_in_either_direction() {
        let check = DrugInteractionCheck::with_default_pairs();
        let snap = snapshot(&[], &[], &["Warfarin 3mg tablets"]);

        let rx = prescription("Aspirin 75mg dispersible tablets", None);
        let finding = check.check(&rx, &snap).await.unwrap().unwrap();
        assert_eq!(finding.issue_type, IssueType::DrugInteraction);
        assert_eq!(finding.severity, Severity::High);

        let snap2 = snapshot(&[], &[], &["Aspirin 75mg"]);
        let rx2 = prescription("Warfarin 5mg tablets", None);
        assert!(check.check(&rx2, &snap2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dosage_ceiling() {
        let mut ceilings = HashMap::new();
        ceilings.insert("paracetamol".to_string(), 100.0);
        let check = DosageCeilingCheck::new(ceilings);
        let snap = snapshot(&[], &[], &[]);

        let over = prescription("Paracetamol 500mg tablets", Some(200.0));
        let finding = check.check(&over, &snap).await.unwrap().unwrap();
        assert_eq!(finding.issue_type, IssueType::Dosage);

        let under = prescription("Paracetamol 500mg tablets", Some(32.0));
        assert!(check.check(&under, &snap).await.unwrap().is_none());

        // No quantity on the request, nothing to evaluate
        let none = prescription("Paracetamol 500mg tablets", None);
        assert!(check.check(&none, &snap).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contraindication() {
        let check = ContraindicationCheck::with_default_rules();
        let rx = prescription("Propranolol 40mg tablets", None);

        let snap = snapshot(&[], &["Asthma"], &[]);
        let finding = check.check(&rx, &snap).await.unwrap().unwrap();
        assert_eq!(finding.issue_type, IssueType::Contraindication);

        let clear = snapshot(&[], &["Hypertension"], &[]);
        assert!(check.check(&rx, &clear).await.unwrap().is_none());
    }
}
