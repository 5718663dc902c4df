//! PDS patient lookup (Spine)

use std::sync::Arc;

use crate::audit::{AuditAction, AuditCategory};
use crate::error::Result;
use crate::fhir::{parse_resource, Patient};
use crate::nhs_number::NhsNumber;

use super::core::{Call, ClientCore};
use super::CATEGORY_PDS;

/// Client for the Personal Demographics Service
#[derive(Debug, Clone)]
pub struct SpineClient {
    core: Arc<ClientCore>,
}

impl SpineClient {
    pub fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Look up a patient by NHS number
    ///
    /// Taking [`NhsNumber`] means malformed input is rejected at the parse
    /// site, before this client spends any rate-limit or network budget.
    pub async fn get_patient_by_nhs_number(
        &self,
        nhs_number: &NhsNumber,
        actor: &str,
    ) -> Result<Patient> {
        let body = self
            .core
            .get_json(
                Call {
                    category: CATEGORY_PDS,
                    action: AuditAction::PatientLookup,
                    audit_category: AuditCategory::Patient,
                    actor,
                    resource_id: Some(nhs_number.as_str()),
                },
                &format!("/Patient/{}", nhs_number),
                Vec::new(),
                true,
            )
            .await?;

        parse_resource(body)
    }
}
