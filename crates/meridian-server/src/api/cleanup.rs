//! Pending retry inspection, sweep and operator override

use super::required;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use meridian_ledger::PendingRetry;
use meridian_orchestrator::CleanupReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub pending: Vec<PendingRetry>,
    pub count: usize,
}

pub async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<PendingResponse>> {
    let pending = state.ledger.list_pending_retries().await?;
    Ok(Json(PendingResponse {
        count: pending.len(),
        pending,
    }))
}

/// Run one cleanup sweep over every pending retry
pub async fn run_cleanup(State(state): State<AppState>) -> ApiResult<Json<CleanupReport>> {
    let report = state.orchestrator.cleanup_pending_retries().await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePendingRequest {
    pub user_id: Option<String>,
    pub endpoint: Option<String>,
    pub inbound: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

pub async fn remove_pending(
    State(state): State<AppState>,
    payload: Result<Json<RemovePendingRequest>, JsonRejection>,
) -> ApiResult<Json<RemovedResponse>> {
    let Json(request) = payload?;
    let user_id = required("userId", &request.user_id)?;
    let node = required("endpoint", &request.endpoint)?;

    let removed = state
        .orchestrator
        .remove_pending_retry(user_id, node, request.inbound.as_deref())
        .await?;
    Ok(Json(RemovedResponse { removed }))
}
