//! BSA exemption (PECS) and eligibility checks

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditAction, AuditCategory};
use crate::error::Result;
use crate::nhs_number::NhsNumber;

use super::core::{Call, ClientCore};
use super::{CATEGORY_ELIGIBILITY, CATEGORY_PECS};

/// Exemption certificate status for a patient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExemptionStatus {
    pub exempt: bool,
    /// Certificate type, e.g. MATERNITY or MEDICAL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    /// ISO date the certificate expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

/// Service eligibility for a patient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    /// Reason code, e.g. AGE_EXEMPT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Client for the NHS Business Services Authority endpoints
#[derive(Debug, Clone)]
pub struct BsaClient {
    core: Arc<ClientCore>,
}

impl BsaClient {
    pub fn new(core: Arc<ClientCore>) -> Self {
        Self { core }
    }

    /// Check the patient's prescription exemption status
    pub async fn check_exemption_status(
        &self,
        nhs_number: &NhsNumber,
        actor: &str,
    ) -> Result<ExemptionStatus> {
        let body = self
            .core
            .get_json(
                Call {
                    category: CATEGORY_PECS,
                    action: AuditAction::ExemptionCheck,
                    audit_category: AuditCategory::Exemption,
                    actor,
                    resource_id: Some(nhs_number.as_str()),
                },
                &format!("/exemptions/{}", nhs_number),
                Vec::new(),
                true,
            )
            .await?;

        Ok(serde_json::from_value(body)?)
    }

    /// Verify eligibility for a service type (e.g. `prescription`)
    pub async fn verify_eligibility(
        &self,
        nhs_number: &NhsNumber,
        service_type: &str,
        actor: &str,
    ) -> Result<Eligibility> {
        let body = self
            .core
            .get_json(
                Call {
                    category: CATEGORY_ELIGIBILITY,
                    action: AuditAction::EligibilityCheck,
                    audit_category: AuditCategory::Eligibility,
                    actor,
                    resource_id: Some(nhs_number.as_str()),
                },
                &format!("/eligibility/{}", nhs_number),
                vec![("serviceType".to_string(), service_type.to_string())],
                true,
            )
            .await?;

        Ok(serde_json::from_value(body)?)
    }
}
