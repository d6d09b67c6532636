//! User provisioning and node inspection routes

use super::required;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use meridian_agent::{RemoteInbound, RemoteUser};
use meridian_orchestrator::{ConnectionEntry, NodeFailure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub uuid: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub uuid: String,
    pub configs: Vec<ConnectionEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_nodes: Vec<NodeFailure>,
}

/// Provision a user on one node or on every active node
pub async fn create_user(
    State(state): State<AppState>,
    body: Option<Json<CreateUserRequest>>,
) -> ApiResult<Json<CreateUserResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let provisioned = state
        .orchestrator
        .create_user(request.uuid, request.endpoint.as_deref())
        .await?;

    Ok(Json(CreateUserResponse {
        uuid: provisioned.user_id,
        configs: provisioned.connections,
        failed_nodes: provisioned.failures,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub message: String,
    pub pending_retries: usize,
}

/// Remove a user everywhere, or from a single node when `endpoint` is given
pub async fn delete_user(
    State(state): State<AppState>,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let Json(request) = payload?;
    let user_id = required("id", &request.id)?;

    match request.endpoint.as_deref().map(str::trim) {
        Some(node) if !node.is_empty() => {
            state
                .orchestrator
                .delete_user_from_node(user_id, node)
                .await?;
            Ok(Json(DeleteUserResponse {
                message: format!("User {} deleted from {}", user_id, node),
                pending_retries: 0,
            }))
        }
        _ => {
            let outcome = state.orchestrator.delete_user(user_id).await?;
            Ok(Json(DeleteUserResponse {
                message: format!("User {} deleted", user_id),
                pending_retries: outcome.failures.len(),
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NodeRequest {
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoteUsersResponse {
    pub users: Vec<RemoteUser>,
}

/// Users currently known to one node
pub async fn get_users(
    State(state): State<AppState>,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResult<Json<RemoteUsersResponse>> {
    let Json(request) = payload?;
    let node = required("endpoint", &request.endpoint)?;
    let users = state.agent.list_users(node).await?;
    Ok(Json(RemoteUsersResponse { users }))
}

#[derive(Debug, Serialize)]
pub struct RemoteInboundsResponse {
    pub inbounds: Vec<RemoteInbound>,
}

/// Inbounds configured on one node
pub async fn get_inbounds(
    State(state): State<AppState>,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResult<Json<RemoteInboundsResponse>> {
    let Json(request) = payload?;
    let node = required("endpoint", &request.endpoint)?;
    let inbounds = state.agent.list_inbounds(node).await?;
    Ok(Json(RemoteInboundsResponse { inbounds }))
}
