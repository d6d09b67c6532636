//! Error types for the HTTP API

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meridian_agent::AgentError;
use meridian_ledger::LedgerError;
use meridian_orchestrator::ProvisionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Provision(e) => match e {
                ProvisionError::Validation(_) => StatusCode::BAD_REQUEST,
                ProvisionError::NodeNotFound(_) | ProvisionError::NotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ProvisionError::NodeInactive(_) => StatusCode::CONFLICT,
                ProvisionError::NoActiveNodes | ProvisionError::AllNodesFailed(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ProvisionError::Transport(_) => StatusCode::BAD_GATEWAY,
                ProvisionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Agent(AgentError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
            ApiError::Agent(_) => StatusCode::BAD_GATEWAY,
            ApiError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = match &self {
            ApiError::Provision(ProvisionError::AllNodesFailed(failures)) => serde_json::json!({
                "error": self.to_string(),
                "failedNodes": failures,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
