//! Exemption and eligibility composite check route

use std::sync::Arc;

use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;

use rx_core::client::CompositeStatus;
use rx_core::NhsNumber;

use super::{Actor, ApiError};
use crate::AppState;

/// Service type assumed when the caller does not name one
const DEFAULT_SERVICE_TYPE: &str = "prescription";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub nhs_number: Option<String>,
    pub service_type: Option<String>,
}

/// Composite patient status: demographics, exemption and eligibility
pub async fn check(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CompositeStatus>, ApiError> {
    let raw = req
        .nhs_number
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("NHS number is required"))?;

    let nhs = NhsNumber::parse(&raw)?;
    let service_type = req.service_type.as_deref().unwrap_or(DEFAULT_SERVICE_TYPE);

    let status = state.status.check(&nhs, service_type, &actor.0).await?;
    Ok(Json(status))
}
