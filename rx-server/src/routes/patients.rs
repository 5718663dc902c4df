//! Patient demographics route

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};

use rx_core::fhir::Patient;
use rx_core::NhsNumber;

use super::{Actor, ApiError};
use crate::AppState;

/// Look up a patient in PDS by NHS number
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(nhs_number): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let nhs = NhsNumber::parse(&nhs_number)?;
    let patient = state.spine.get_patient_by_nhs_number(&nhs, &actor.0).await?;
    Ok(Json(patient))
}
