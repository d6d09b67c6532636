//! Error types for the orchestrator

use meridian_ledger::LedgerError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a single node did not complete its part of a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The shared deadline passed before the node answered
    DeadlineExceeded,
    /// Transport failure or non-success answer from the node agent
    Agent,
    /// The node answered but its descriptor could not be turned into a link
    Synthesis,
}

/// A node-scoped failure captured during a fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node: String,
    pub kind: FailureKind,
    pub message: String,
}

impl NodeFailure {
    pub fn new(node: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn timeout(node: &str) -> Self {
        Self::new(node, FailureKind::DeadlineExceeded, "request deadline exceeded")
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.message)
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node is not active: {0}")]
    NodeInactive(String),

    #[error("No active nodes available")]
    NoActiveNodes,

    #[error("All {} nodes failed", .0.len())]
    AllNodesFailed(Vec<NodeFailure>),

    #[error("Node call failed: {0}")]
    Transport(NodeFailure),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
