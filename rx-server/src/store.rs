//! Client-backed prescription store for validation
//!
//! The validation service needs a prescription plus its patient context.
//! This adapter assembles both from the live clients: the prescription from
//! EPS, the patient from PDS via the subject reference. Allergy, condition
//! and medication histories are not served by these APIs, so the snapshot
//! carries empty lists unless a richer source is wired in.

use std::sync::Arc;

use async_trait::async_trait;

use rx_core::client::{EpsClient, SpineClient};
use rx_core::validate::{PatientSnapshot, PrescriptionStore};
use rx_core::{MedicationRequest, NhsNumber, Result, RxError};

/// Actor recorded for lookups made on behalf of validation
const VALIDATION_ACTOR: &str = "validation-service";

pub struct ClientBackedStore {
    eps: Arc<EpsClient>,
    spine: Arc<SpineClient>,
}

impl ClientBackedStore {
    pub fn new(eps: Arc<EpsClient>, spine: Arc<SpineClient>) -> Self {
        Self { eps, spine }
    }
}

#[async_trait]
impl PrescriptionStore for ClientBackedStore {
    async fn load(
        &self,
        prescription_id: &str,
    ) -> Result<Option<(MedicationRequest, PatientSnapshot)>> {
        let prescription = match self.eps.get_prescription(prescription_id, VALIDATION_ACTOR).await
        {
            Ok(p) => p,
            Err(RxError::PrescriptionNotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };

        let nhs_number = prescription
            .subject
            .as_ref()
            .and_then(|s| s.reference.as_deref())
            .and_then(|r| r.strip_prefix("Patient/"))
            .ok_or_else(|| RxError::Internal {
                reason: format!(
                    "prescription '{}' has no patient subject reference",
                    prescription_id
                ),
            })?;
        let nhs = NhsNumber::parse(nhs_number)?;

        let patient = self
            .spine
            .get_patient_by_nhs_number(&nhs, VALIDATION_ACTOR)
            .await?;

        Ok(Some((
            prescription,
            PatientSnapshot {
                patient,
                allergies: Vec::new(),
                conditions: Vec::new(),
                current_medications: Vec::new(),
            },
        )))
    }
}
