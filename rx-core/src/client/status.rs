//! Composite patient status
//!
//! One call fanning out to PDS, PECS and the eligibility service
//! concurrently. Each leg goes through its own façade, so per-category
//! rate limits, caching and audit all apply as usual.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::error::Result;
use crate::fhir::Patient;
use crate::nhs_number::NhsNumber;

use super::bsa::{BsaClient, Eligibility, ExemptionStatus};
use super::spine::SpineClient;

/// Demographics, exemption and eligibility for one patient in one shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeStatus {
    pub patient: Patient,
    pub exemption: ExemptionStatus,
    pub eligibility: Eligibility,
    pub timestamp: DateTime<Utc>,
}

/// Runs the three per-patient lookups concurrently
pub struct StatusCheck {
    spine: Arc<SpineClient>,
    bsa: Arc<BsaClient>,
    clock: SharedClock,
}

impl StatusCheck {
    pub fn new(spine: Arc<SpineClient>, bsa: Arc<BsaClient>, clock: SharedClock) -> Self {
        Self { spine, bsa, clock }
    }

    /// Full status for one patient
    ///
    /// The three upstream calls run concurrently; the first error wins and
    /// the whole check fails.
    pub async fn check(
        &self,
        nhs_number: &NhsNumber,
        service_type: &str,
        actor: &str,
    ) -> Result<CompositeStatus> {
        let (patient, exemption, eligibility) = tokio::try_join!(
            self.spine.get_patient_by_nhs_number(nhs_number, actor),
            self.bsa.check_exemption_status(nhs_number, actor),
            self.bsa.verify_eligibility(nhs_number, service_type, actor),
        )?;

        Ok(CompositeStatus {
            patient,
            exemption,
            eligibility,
            timestamp: self.clock.now_utc(),
        })
    }
}

impl std::fmt::Debug for StatusCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCheck").finish_non_exhaustive()
    }
}
