//! Results returned by orchestrator operations

use crate::error::NodeFailure;
use serde::Serialize;

/// One synthesized connection for the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    /// Region tag of the node the link points to
    pub country_code: String,
    pub config: String,
}

/// Outcome of a successful (possibly partial) create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub user_id: String,
    /// Links for every node that succeeded, in node enumeration order
    pub connections: Vec<ConnectionEntry>,
    /// Nodes that failed; non-empty means a partial success
    pub failures: Vec<NodeFailure>,
}

impl Provisioned {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Outcome of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Node calls dispatched, one per assignment
    pub attempted: usize,
    /// Failures recorded as pending retries
    pub failures: Vec<NodeFailure>,
}

/// Aggregate of one cleanup sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub total_attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: Vec<String>,
}
