//! EPS prescription lifecycle client
//!
//! Read operations go through the shared per-call protocol like the other
//! façades. Status transitions additionally enforce the prescription state
//! machine (`active → completed`, `active → cancelled`, terminal
//! thereafter):
//!
//! - per-prescription mutations are serialized through a per-id async lock,
//!   so two concurrent transitions for the same id cannot both succeed
//! - the current status is re-read fresh (cache bypassed) immediately
//!   before the PUT, compare-and-swap style
//! - a dispense is gated on the stock check; any short item refuses the
//!   transition

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditAction, AuditCategory};
use crate::error::{Result, RxError};
use crate::fhir::{parse_resource, Bundle, CodeableConcept, Coding, MedicationRequest,
    PrescriptionStatus};

use super::core::{Call, ClientCore};
use super::CATEGORY_EPS;

/// Structured cancellation reason required by EPS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReason {
    pub code: String,
    pub display: String,
}

/// Inventory gate consulted before a dispense completes
#[async_trait]
pub trait StockChecker: Send + Sync {
    /// Names of prescribed items that cannot be covered by current stock
    async fn short_items(&self, prescription: &MedicationRequest) -> Result<Vec<String>>;
}

/// Stock checker that always reports full availability
#[derive(Debug, Default)]
pub struct AlwaysInStock;

#[async_trait]
impl StockChecker for AlwaysInStock {
    async fn short_items(&self, _prescription: &MedicationRequest) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Stock checker backed by an in-memory quantity map
///
/// An item is short when its recorded quantity is zero. Items with no
/// record are treated as in stock, matching the original system's
/// behavior of only blocking on known-empty lines.
#[derive(Debug, Default)]
pub struct InMemoryStock {
    quantities: Mutex<HashMap<String, u32>>,
}

impl InMemoryStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quantity(&self, item: impl Into<String>, quantity: u32) {
        self.quantities.lock().insert(item.into(), quantity);
    }
}

#[async_trait]
impl StockChecker for InMemoryStock {
    async fn short_items(&self, prescription: &MedicationRequest) -> Result<Vec<String>> {
        let quantities = self.quantities.lock();
        let mut short = Vec::new();
        if let Some(item) = prescription.medication_display() {
            if quantities.get(item).copied() == Some(0) {
                short.push(item.to_string());
            }
        }
        Ok(short)
    }
}

/// Client for the Electronic Prescription Service
pub struct EpsClient {
    core: Arc<ClientCore>,
    stock: Arc<dyn StockChecker>,
    mutation_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EpsClient {
    pub fn new(core: Arc<ClientCore>, stock: Arc<dyn StockChecker>) -> Self {
        Self {
            core,
            stock,
            mutation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch one prescription
    pub async fn get_prescription(&self, id: &str, actor: &str) -> Result<MedicationRequest> {
        let body = self
            .core
            .get_json(
                self.call(AuditAction::PrescriptionFetch, actor, Some(id)),
                &format!("/MedicationRequest/{}", id),
                Vec::new(),
                true,
            )
            .await
            .map_err(|err| not_found_for(err, id))?;

        parse_resource(body)
    }

    /// All prescriptions assigned to a pharmacy (by ODS code)
    pub async fn get_pharmacy_prescriptions(
        &self,
        ods_code: &str,
        actor: &str,
    ) -> Result<Bundle> {
        let body = self
            .core
            .get_json(
                self.call(AuditAction::PrescriptionSearch, actor, None),
                "/MedicationRequest",
                vec![("performer".to_string(), ods_code.to_string())],
                true,
            )
            .await?;

        parse_resource(body)
    }

    /// Search prescriptions with arbitrary FHIR search parameters
    pub async fn search_prescriptions(
        &self,
        params: Vec<(String, String)>,
        actor: &str,
    ) -> Result<Bundle> {
        let body = self
            .core
            .get_json(
                self.call(AuditAction::PrescriptionSearch, actor, None),
                "/MedicationRequest",
                params,
                true,
            )
            .await?;

        parse_resource(body)
    }

    /// Transition a prescription to a new status
    ///
    /// The generic entry point behind [`cancel_prescription`] and
    /// [`complete_prescription`]; exposed for callers that drive the state
    /// machine directly.
    ///
    /// [`cancel_prescription`]: EpsClient::cancel_prescription
    /// [`complete_prescription`]: EpsClient::complete_prescription
    pub async fn update_prescription_status(
        &self,
        id: &str,
        status: PrescriptionStatus,
        actor: &str,
    ) -> Result<MedicationRequest> {
        self.transition(id, status, None, AuditAction::StatusUpdate, actor)
            .await
    }

    /// Cancel an active prescription with a structured reason
    pub async fn cancel_prescription(
        &self,
        id: &str,
        reason: CancelReason,
        actor: &str,
    ) -> Result<MedicationRequest> {
        self.transition(
            id,
            PrescriptionStatus::Cancelled,
            Some(reason),
            AuditAction::PrescriptionCancel,
            actor,
        )
        .await
    }

    /// Complete (dispense) an active prescription
    ///
    /// Refused with [`RxError::StockUnavailable`] when any prescribed item
    /// is out of stock.
    pub async fn complete_prescription(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<MedicationRequest> {
        self.transition(
            id,
            PrescriptionStatus::Completed,
            None,
            AuditAction::PrescriptionComplete,
            actor,
        )
        .await
    }

    async fn transition(
        &self,
        id: &str,
        to: PrescriptionStatus,
        reason: Option<CancelReason>,
        action: AuditAction,
        actor: &str,
    ) -> Result<MedicationRequest> {
        let _guard = self.lock_for(id).lock_owned().await;

        // CAS discipline: read the current status fresh, then PUT. The
        // per-id lock keeps in-process racers out between the two.
        let body = self
            .core
            .get_json(
                self.call(AuditAction::PrescriptionFetch, actor, Some(id)),
                &format!("/MedicationRequest/{}", id),
                Vec::new(),
                false,
            )
            .await
            .map_err(|err| not_found_for(err, id))?;
        let mut current: MedicationRequest = parse_resource(body)?;

        if !current.status.can_transition_to(to) {
            return Err(RxError::InvalidTransition {
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }

        if to == PrescriptionStatus::Completed {
            let short = self.stock.short_items(&current).await?;
            if !short.is_empty() {
                return Err(RxError::StockUnavailable { items: short });
            }
        }

        let from = current.status;
        current.status = to;
        if let Some(reason) = &reason {
            current.status_reason = Some(CodeableConcept {
                coding: vec![Coding {
                    system: None,
                    code: Some(reason.code.clone()),
                    display: Some(reason.display.clone()),
                }],
                text: Some(reason.display.clone()),
            });
        }

        let updated = self
            .core
            .send_json(
                self.call(action, actor, Some(id)),
                crate::transport::ApiRequest::put(
                    format!("/MedicationRequest/{}", id),
                    serde_json::to_value(&current)?,
                ),
                json!({
                    "before": from.as_str(),
                    "after": to.as_str(),
                    "reason": reason,
                }),
            )
            .await?;

        parse_resource(updated)
    }

    fn call<'a>(
        &self,
        action: AuditAction,
        actor: &'a str,
        resource_id: Option<&'a str>,
    ) -> Call<'a> {
        Call {
            category: CATEGORY_EPS,
            action,
            audit_category: AuditCategory::Prescription,
            actor,
            resource_id,
        }
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.mutation_locks.lock();
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl std::fmt::Debug for EpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpsClient").finish_non_exhaustive()
    }
}

/// Upstream 404 on a prescription path means the prescription is unknown
fn not_found_for(err: RxError, id: &str) -> RxError {
    match err {
        RxError::Upstream { status: 404, .. } => RxError::PrescriptionNotFound {
            id: id.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::tests::core_harness;
    use crate::transport::HttpMethod;

    fn active_prescription(id: &str, display: &str) -> serde_json::Value {
        json!({
            "resourceType": "MedicationRequest",
            "id": id,
            "status": "active",
            "medicationCodeableConcept": {"coding": [{"display": display}]}
        })
    }

    fn client_with(stock: Arc<dyn StockChecker>) -> (EpsClient, crate::client::core::tests::CoreHarness) {
        let h = core_harness(100);
        let client = EpsClient::new(h.core.clone(), stock);
        (client, h)
    }

    #[tokio::test]
    async fn test_get_prescription_maps_404() {
        let (client, _h) = client_with(Arc::new(AlwaysInStock));

        match client.get_prescription("rx-missing", "x").await {
            Err(RxError::PrescriptionNotFound { id }) => assert_eq!(id, "rx-missing"),
            other => panic!("expected PrescriptionNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_active_prescription() {
        let (client, h) = client_with(Arc::new(AlwaysInStock));
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-1",
            active_prescription("rx-1", "Amoxicillin 500mg capsules"),
        );
        h.transport.on(
            HttpMethod::Put,
            "/MedicationRequest/rx-1",
            json!({
                "resourceType": "MedicationRequest",
                "id": "rx-1",
                "status": "completed"
            }),
        );

        let updated = client.complete_prescription("rx-1", "pharmacist-01").await.unwrap();
        assert_eq!(updated.status, PrescriptionStatus::Completed);

        // The PUT body carried the new status
        let put = h
            .transport
            .requests()
            .into_iter()
            .find(|r| r.method == HttpMethod::Put)
            .unwrap();
        assert_eq!(put.body.as_ref().unwrap()["status"], "completed");

        // Audit trail: fresh fetch + the mutation itself
        let records = h.audit.records_for(AuditAction::PrescriptionComplete);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].details["before"], "active");
        assert_eq!(records[0].details["after"], "completed");
    }

    #[tokio::test]
    async fn test_cancel_requires_active_status() {
        let (client, h) = client_with(Arc::new(AlwaysInStock));
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-done",
            json!({
                "resourceType": "MedicationRequest",
                "id": "rx-done",
                "status": "completed"
            }),
        );

        let reason = CancelReason {
            code: "0001".to_string(),
            display: "Prescribing error".to_string(),
        };
        match client.cancel_prescription("rx-done", reason, "x").await {
            Err(RxError::InvalidTransition { from, to }) => {
                assert_eq!(from, "completed");
                assert_eq!(to, "cancelled");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }

        // No PUT was attempted
        assert!(h
            .transport
            .requests()
            .iter()
            .all(|r| r.method != HttpMethod::Put));
    }

    #[tokio::test]
    async fn test_cancel_records_structured_reason() {
        let (client, h) = client_with(Arc::new(AlwaysInStock));
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-1",
            active_prescription("rx-1", "Amoxicillin 500mg capsules"),
        );
        h.transport.on(
            HttpMethod::Put,
            "/MedicationRequest/rx-1",
            json!({
                "resourceType": "MedicationRequest",
                "id": "rx-1",
                "status": "cancelled"
            }),
        );

        let reason = CancelReason {
            code: "0001".to_string(),
            display: "Prescribing error".to_string(),
        };
        client.cancel_prescription("rx-1", reason, "x").await.unwrap();

        let put = h
            .transport
            .requests()
            .into_iter()
            .find(|r| r.method == HttpMethod::Put)
            .unwrap();
        let body = put.body.unwrap();
        assert_eq!(body["statusReason"]["coding"][0]["code"], "0001");
        assert_eq!(body["statusReason"]["coding"][0]["display"], "Prescribing error");
    }

    #[tokio::test]
    async fn test_complete_blocked_by_zero_stock() {
        let stock = Arc::new(InMemoryStock::new());
        stock.set_quantity("Amoxicillin 500mg capsules", 0);
        let (client, h) = client_with(stock);
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-1",
            active_prescription("rx-1", "Amoxicillin 500mg capsules"),
        );

        match client.complete_prescription("rx-1", "x").await {
            Err(RxError::StockUnavailable { items }) => {
                assert_eq!(items, vec!["Amoxicillin 500mg capsules".to_string()]);
            }
            other => panic!("expected StockUnavailable, got {:?}", other),
        }

        // Transition refused before the PUT
        assert!(h
            .transport
            .requests()
            .iter()
            .all(|r| r.method != HttpMethod::Put));
    }

    #[tokio::test]
    async fn test_second_transition_sees_terminal_status() {
        let (client, h) = client_with(Arc::new(AlwaysInStock));
        // The fresh re-read before the PUT means a later caller observes
        // the terminal status even though its own earlier fetch (had it
        // raced) would have seen active.
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-1",
            active_prescription("rx-1", "Amoxicillin 500mg capsules"),
        );
        h.transport.on(
            HttpMethod::Put,
            "/MedicationRequest/rx-1",
            json!({
                "resourceType": "MedicationRequest",
                "id": "rx-1",
                "status": "completed"
            }),
        );

        let first = client.complete_prescription("rx-1", "x").await;
        assert!(first.is_ok());

        // Upstream now reports the terminal status
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest/rx-1",
            json!({
                "resourceType": "MedicationRequest",
                "id": "rx-1",
                "status": "completed"
            }),
        );

        let second = client
            .cancel_prescription(
                "rx-1",
                CancelReason {
                    code: "0001".to_string(),
                    display: "Prescribing error".to_string(),
                },
                "x",
            )
            .await;
        assert!(matches!(second, Err(RxError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_pharmacy_prescriptions_bundle() {
        let (client, h) = client_with(Arc::new(AlwaysInStock));
        h.transport.on(
            HttpMethod::Get,
            "/MedicationRequest",
            json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "total": 1,
                "entry": [{"resource": active_prescription("rx-9", "Salbutamol 100mcg inhaler")}]
            }),
        );

        let bundle = client.get_pharmacy_prescriptions("FA565", "x").await.unwrap();
        assert_eq!(bundle.prescriptions().count(), 1);
        assert_eq!(
            h.transport.requests()[0].query,
            vec![("performer".to_string(), "FA565".to_string())]
        );
    }
}
