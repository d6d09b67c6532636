//! Node registry administration

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use meridian_ledger::Node;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ServersBody {
    #[serde(default)]
    pub servers: Vec<Node>,
}

#[derive(Debug, Deserialize)]
pub struct ServerRef {
    pub endpoint: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteServersRequest {
    #[serde(default)]
    pub servers: Vec<ServerRef>,
}

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

fn validate(servers: &[Node]) -> ApiResult<()> {
    if servers.is_empty() {
        return Err(ApiError::BadRequest("servers must not be empty".to_string()));
    }
    for node in servers {
        if node.address.trim().is_empty() {
            return Err(ApiError::BadRequest("endpoint is required".to_string()));
        }
        if node.country_code.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "countryCode is required for {}",
                node.address
            )));
        }
        if node.protocol.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "inboundType is required for {}",
                node.address
            )));
        }
    }
    Ok(())
}

pub async fn list_servers(State(state): State<AppState>) -> ApiResult<Json<ServersBody>> {
    let servers = state.ledger.list_nodes(false).await?;
    Ok(Json(ServersBody { servers }))
}

/// Register nodes, replacing any already known by address
pub async fn add_servers(
    State(state): State<AppState>,
    payload: Result<Json<ServersBody>, JsonRejection>,
) -> ApiResult<Json<AffectedResponse>> {
    let Json(body) = payload?;
    validate(&body.servers)?;
    state.ledger.upsert_nodes(&body.servers).await?;

    tracing::info!("Registered {} servers", body.servers.len());
    Ok(Json(AffectedResponse {
        affected: body.servers.len() as u64,
    }))
}

pub async fn update_servers(
    State(state): State<AppState>,
    payload: Result<Json<ServersBody>, JsonRejection>,
) -> ApiResult<Json<AffectedResponse>> {
    let Json(body) = payload?;
    validate(&body.servers)?;
    let affected = state.ledger.update_nodes(&body.servers).await?;

    tracing::info!("Updated {} of {} servers", affected, body.servers.len());
    Ok(Json(AffectedResponse { affected }))
}

pub async fn delete_servers(
    State(state): State<AppState>,
    payload: Result<Json<DeleteServersRequest>, JsonRejection>,
) -> ApiResult<Json<AffectedResponse>> {
    let Json(body) = payload?;
    let addresses: Vec<String> = body
        .servers
        .into_iter()
        .map(|s| s.endpoint)
        .filter(|e| !e.trim().is_empty())
        .collect();
    if addresses.is_empty() {
        return Err(ApiError::BadRequest("servers must not be empty".to_string()));
    }

    let affected = state.ledger.delete_nodes(&addresses).await?;

    tracing::info!("Deleted {} servers", affected);
    Ok(Json(AffectedResponse { affected }))
}
