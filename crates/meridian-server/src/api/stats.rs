//! Statistics and listings

use crate::error::ApiResult;
use crate::state::AppState;
use axum::{extract::State, Json};
use meridian_ledger::{NodeStats, NodeUsers, UserDetail};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: u64,
    pub users_by_protocol: BTreeMap<String, u64>,
    pub nodes: Vec<NodeStats>,
    pub pending_deletions: u64,
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let ledger = &state.ledger;
    Ok(Json(StatsResponse {
        total_users: ledger.count_users().await?,
        users_by_protocol: ledger.users_by_protocol().await?,
        nodes: ledger.node_stats().await?,
        pending_deletions: ledger.count_pending_retries().await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserDetail>,
    pub count: usize,
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse>> {
    let users = state.ledger.list_users().await?;
    Ok(Json(UsersResponse {
        count: users.len(),
        users,
    }))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub async fn count_users(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    let count = state.ledger.count_users().await?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeUsers>,
}

pub async fn nodes_with_users(State(state): State<AppState>) -> ApiResult<Json<NodesResponse>> {
    let nodes = state.ledger.list_nodes_with_users().await?;
    Ok(Json(NodesResponse { nodes }))
}
