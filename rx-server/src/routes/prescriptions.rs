//! Prescription lifecycle routes

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use rx_core::client::CancelReason;
use rx_core::fhir::{Bundle, MedicationRequest};
use rx_core::validate::ValidationResult;

use super::{Actor, ApiError};
use crate::AppState;

/// Fetch one prescription
pub async fn get_prescription(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let prescription = state.eps.get_prescription(&id, &actor.0).await?;
    Ok(Json(prescription))
}

/// Search prescriptions
///
/// `?odsCode=FA565` lists a pharmacy's assigned prescriptions; any other
/// query parameters pass through as FHIR search parameters.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Bundle>, ApiError> {
    let bundle = match params.get("odsCode") {
        Some(ods_code) => {
            state
                .eps
                .get_pharmacy_prescriptions(ods_code, &actor.0)
                .await?
        }
        None => {
            let search: Vec<(String, String)> = params.into_iter().collect();
            state.eps.search_prescriptions(search, &actor.0).await?
        }
    };
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub code: Option<String>,
    pub display: Option<String>,
}

/// Cancel an active prescription
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let code = req
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Cancellation reason code is required"))?;
    let reason = CancelReason {
        display: req.display.unwrap_or_else(|| code.clone()),
        code,
    };

    let cancelled = state.eps.cancel_prescription(&id, reason, &actor.0).await?;
    Ok(Json(cancelled))
}

/// Complete (dispense) an active prescription
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let completed = state.eps.complete_prescription(&id, &actor.0).await?;
    Ok(Json(completed))
}

/// Run the clinical safety checks for a prescription
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ValidationResult>, ApiError> {
    let result = state.validation.validate_prescription(&id, &actor.0).await?;
    Ok(Json(result))
}
