//! Integration test walking the full pharmacy flow against mocked NHS
//! endpoints: patient status, prescription fetch, clinical validation,
//! then dispense.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use rx_core::audit::{AuditAction, MemoryAuditSink};
use rx_core::auth::{TokenCache, TokenGrant, TokenProvider};
use rx_core::cache::ResponseCache;
use rx_core::client::{
    AlwaysInStock, BsaClient, ClientCore, EpsClient, InMemoryStock, SpineClient, StatusCheck,
};
use rx_core::clock::MockClock;
use rx_core::fhir::{MedicationRequest, Patient, PrescriptionStatus};
use rx_core::limit::{InMemoryWindowStore, RateLimiter, RateLimiterConfig};
use rx_core::notify::MemoryNotificationSink;
use rx_core::transport::{HttpMethod, MockTransport};
use rx_core::validate::{
    AllergyClassCheck, DrugInteractionCheck, PatientSnapshot, PrescriptionStore,
    ValidationService,
};
use rx_core::{NhsNumber, Result, RxError};

const NHS_NUMBER: &str = "9434765870";
const ACTOR: &str = "pharmacist-01";

struct StaticProvider;

#[async_trait]
impl TokenProvider for StaticProvider {
    async fn exchange(&self) -> Result<TokenGrant> {
        Ok(TokenGrant {
            access_token: "integration-token".to_string(),
            expires_in: Duration::from_secs(600),
            scopes: vec!["personal-demographics-service:USER-RESTRICTED".to_string()],
        })
    }
}

struct Stack {
    core: Arc<ClientCore>,
    transport: Arc<MockTransport>,
    audit: Arc<MemoryAuditSink>,
}

fn stack() -> Stack {
    let clock = Arc::new(MockClock::new());
    let transport = Arc::new(MockTransport::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let core = Arc::new(ClientCore::new(
        transport.clone(),
        TokenCache::new(Arc::new(StaticProvider), clock.clone()),
        Arc::new(RateLimiter::with_config(
            RateLimiterConfig::default(),
            Arc::new(InMemoryWindowStore::new()),
            clock.clone(),
        )),
        Arc::new(ResponseCache::new(clock.clone())),
        audit.clone(),
        clock,
    ));
    Stack {
        core,
        transport,
        audit,
    }
}

fn register_patient_routes(transport: &MockTransport) {
    transport.on(
        HttpMethod::Get,
        &format!("/Patient/{}", NHS_NUMBER),
        json!({
            "resourceType": "Patient",
            "id": NHS_NUMBER,
            "identifier": [{
                "system": "https://fhir.nhs.uk/Id/nhs-number",
                "value": NHS_NUMBER
            }],
            "name": [{"family": "Smith", "given": ["Jane"]}],
            "birthDate": "1990-03-14"
        }),
    );
    transport.on(
        HttpMethod::Get,
        &format!("/exemptions/{}", NHS_NUMBER),
        json!({"exempt": true, "certificateType": "MATERNITY", "expiryDate": "2026-12-31"}),
    );
    transport.on(
        HttpMethod::Get,
        &format!("/eligibility/{}", NHS_NUMBER),
        json!({"eligible": true, "reason": "MATERNITY_EXEMPT"}),
    );
}

fn test_patient() -> Patient {
    serde_json::from_value(json!({
        "resourceType": "Patient",
        "id": NHS_NUMBER,
        "identifier": [{
            "system": "https://fhir.nhs.uk/Id/nhs-number",
            "value": NHS_NUMBER
        }]
    }))
    .unwrap()
}

fn prescription_json(status: &str) -> serde_json::Value {
    json!({
        "resourceType": "MedicationRequest",
        "id": "rx-100",
        "status": status,
        "medicationCodeableConcept": {
            "coding": [{"display": "Amoxicillin 500mg capsules"}]
        },
        "subject": {"reference": format!("Patient/{}", NHS_NUMBER)},
        "dispenseRequest": {"quantity": {"value": 21.0, "unit": "capsule"}}
    })
}

/// The full happy path: status check, fetch, validate, dispense.
#[tokio::test]
async fn test_full_dispense_flow() {
    let stack = stack();
    register_patient_routes(&stack.transport);
    stack.transport.on(
        HttpMethod::Get,
        "/MedicationRequest/rx-100",
        prescription_json("active"),
    );
    stack.transport.on(
        HttpMethod::Put,
        "/MedicationRequest/rx-100",
        prescription_json("completed"),
    );

    // 1. Validated identifier at the boundary
    let nhs = NhsNumber::parse(NHS_NUMBER).unwrap();

    // 2. Composite status: demographics + exemption + eligibility
    let spine = Arc::new(SpineClient::new(stack.core.clone()));
    let bsa = Arc::new(BsaClient::new(stack.core.clone()));
    let status_check = StatusCheck::new(spine, bsa, Arc::new(MockClock::new()));
    let status = status_check.check(&nhs, "prescription", ACTOR).await.unwrap();
    assert_eq!(status.patient.nhs_number(), Some(NHS_NUMBER));
    assert!(status.exemption.exempt);
    assert!(status.eligibility.eligible);

    // 3. Fetch the prescription
    let eps = EpsClient::new(stack.core.clone(), Arc::new(AlwaysInStock));
    let prescription = eps.get_prescription("rx-100", ACTOR).await.unwrap();
    assert_eq!(prescription.status, PrescriptionStatus::Active);

    // 4. Clinical validation against the patient snapshot
    let validation = validation_service(&stack, prescription.clone());
    let result = validation.validate_prescription("rx-100", ACTOR).await.unwrap();
    assert!(result.is_valid, "clean prescription should validate");

    // 5. Dispense
    let completed = eps.complete_prescription("rx-100", ACTOR).await.unwrap();
    assert_eq!(completed.status, PrescriptionStatus::Completed);

    // Every step left an audit record
    assert!(!stack.audit.records_for(AuditAction::PatientLookup).is_empty());
    assert!(!stack.audit.records_for(AuditAction::ExemptionCheck).is_empty());
    assert!(!stack.audit.records_for(AuditAction::EligibilityCheck).is_empty());
    assert!(!stack.audit.records_for(AuditAction::PrescriptionFetch).is_empty());
    assert!(!stack.audit.records_for(AuditAction::PrescriptionValidation).is_empty());
    assert_eq!(stack.audit.records_for(AuditAction::PrescriptionComplete).len(), 1);
}

/// An allergy finding blocks nothing mechanically but is reported critical,
/// and the dispense gate separately refuses out-of-stock items.
#[tokio::test]
async fn test_allergy_flags_and_stock_gate() {
    let stack = stack();
    stack.transport.on(
        HttpMethod::Get,
        "/MedicationRequest/rx-100",
        prescription_json("active"),
    );

    // Patient allergic to penicillin: amoxicillin must come back critical
    let prescription: MedicationRequest =
        serde_json::from_value(prescription_json("active")).unwrap();
    let snapshot = PatientSnapshot {
        patient: test_patient(),
        allergies: vec!["penicillin".to_string()],
        conditions: Vec::new(),
        current_medications: Vec::new(),
    };
    let store = Arc::new(FixedStore {
        prescription,
        snapshot,
    });
    let notifications = Arc::new(MemoryNotificationSink::new());
    let service = ValidationService::new(
        store,
        vec![Arc::new(AllergyClassCheck::with_default_classes())],
        notifications.clone(),
        stack.audit.clone(),
        Arc::new(MockClock::new()),
    );

    let result = service.validate_prescription("rx-100", ACTOR).await.unwrap();
    assert!(!result.is_valid);
    assert_eq!(notifications.len(), 1, "critical finding raises one alert");

    // Zero stock refuses the dispense outright
    let shelf = Arc::new(InMemoryStock::new());
    shelf.set_quantity("Amoxicillin 500mg capsules", 0);
    let eps = EpsClient::new(stack.core.clone(), shelf);
    match eps.complete_prescription("rx-100", ACTOR).await {
        Err(RxError::StockUnavailable { items }) => {
            assert_eq!(items, vec!["Amoxicillin 500mg capsules".to_string()]);
        }
        other => panic!("expected StockUnavailable, got {:?}", other),
    }
}

/// Repeated GETs within the cache TTL reuse the cached body; the audit
/// trail still records both accesses.
#[tokio::test]
async fn test_cached_lookup_still_audited() {
    let stack = stack();
    register_patient_routes(&stack.transport);

    let nhs = NhsNumber::parse(NHS_NUMBER).unwrap();
    let spine = SpineClient::new(stack.core.clone());

    spine.get_patient_by_nhs_number(&nhs, ACTOR).await.unwrap();
    spine.get_patient_by_nhs_number(&nhs, ACTOR).await.unwrap();

    assert_eq!(stack.transport.calls_to(&format!("/Patient/{}", NHS_NUMBER)), 1);
    assert_eq!(stack.audit.records_for(AuditAction::PatientLookup).len(), 2);
}

struct FixedStore {
    prescription: MedicationRequest,
    snapshot: PatientSnapshot,
}

#[async_trait]
impl PrescriptionStore for FixedStore {
    async fn load(
        &self,
        prescription_id: &str,
    ) -> Result<Option<(MedicationRequest, PatientSnapshot)>> {
        if prescription_id == self.prescription.id {
            Ok(Some((self.prescription.clone(), self.snapshot.clone())))
        } else {
            Ok(None)
        }
    }
}

fn validation_service(stack: &Stack, prescription: MedicationRequest) -> ValidationService {
    let snapshot = PatientSnapshot {
        patient: test_patient(),
        allergies: Vec::new(),
        conditions: Vec::new(),
        current_medications: Vec::new(),
    };
    ValidationService::new(
        Arc::new(FixedStore {
            prescription,
            snapshot,
        }),
        vec![
            Arc::new(AllergyClassCheck::with_default_classes()),
            Arc::new(DrugInteractionCheck::with_default_pairs()),
        ],
        Arc::new(MemoryNotificationSink::new()),
        stack.audit.clone(),
        Arc::new(MockClock::new()),
    )
}
