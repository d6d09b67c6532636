use crate::error::{ProvisionError, Result};
use crate::types::DeleteOutcome;
use crate::{call_before, require, Orchestrator};
use futures::future::join_all;
use meridian_ledger::{RetryFailure, RetryKey};
use tracing::{error, info, warn};

impl Orchestrator {
    /// Remove a user from every node it is assigned to.
    ///
    /// Each failed node call is recorded as a pending retry. The user's
    /// assignments are cleared once the fan-out completes, whatever the
    /// individual outcomes were; stragglers are left to the cleanup sweep.
    pub async fn delete_user(&self, user_id: &str) -> Result<DeleteOutcome> {
        require("user id", user_id)?;

        let assignments = self.ledger.assignments_for_user(user_id).await?;
        if assignments.is_empty() {
            info!(user_id, "No assignments, nothing to delete");
            return Ok(DeleteOutcome::default());
        }

        let deadline = self.deadline();
        let outcomes = join_all(assignments.iter().map(|a| {
            call_before(deadline, &a.node, self.agent.delete_user(&a.node, user_id))
        }))
        .await;

        let mut retries = Vec::new();
        let mut failures = Vec::new();
        for (assignment, outcome) in assignments.iter().zip(outcomes) {
            if let Err(failure) = outcome {
                warn!(user_id, node = %failure.node, "Delete failed: {}", failure.message);
                retries.push(RetryFailure::new(
                    RetryKey::new(user_id, &assignment.node, &assignment.protocol),
                    failure.message.clone(),
                ));
                failures.push(failure);
            }
        }

        if let Err(e) = self.ledger.record_pending_retries(&retries).await {
            error!(user_id, "Failed to record {} pending retries: {}", retries.len(), e);
        }

        if let Err(e) = self.ledger.delete_assignments_for_user(user_id).await {
            error!(user_id, "Failed to clear assignments: {}", e);
        }

        info!(
            user_id,
            attempted = assignments.len(),
            failed = failures.len(),
            "User deleted"
        );

        Ok(DeleteOutcome {
            attempted: assignments.len(),
            failures,
        })
    }

    /// Remove a user from exactly one node.
    ///
    /// Assignments are left untouched on success and on failure. A failure
    /// is recorded as a pending retry only when an assignment for the pair
    /// supplies the protocol.
    pub async fn delete_user_from_node(&self, user_id: &str, node: &str) -> Result<()> {
        require("user id", user_id)?;
        require("endpoint", node)?;

        let outcome = call_before(self.deadline(), node, self.agent.delete_user(node, user_id)).await;

        let failure = match outcome {
            Ok(()) => {
                info!(user_id, node, "User deleted from node");
                return Ok(());
            }
            Err(failure) => failure,
        };

        warn!(user_id, node, "Targeted delete failed: {}", failure.message);

        match self.protocol_for(user_id, node).await {
            Some(protocol) => {
                let retry = RetryFailure::new(
                    RetryKey::new(user_id, node, protocol),
                    failure.message.clone(),
                );
                if let Err(e) = self.ledger.record_pending_retry(&retry).await {
                    error!(user_id, node, "Failed to record pending retry: {}", e);
                }
            }
            None => warn!(user_id, node, "No assignment on node, pending retry not recorded"),
        }

        Err(ProvisionError::Transport(failure))
    }

    /// Protocol of the user's assignment on `node`, if one exists
    async fn protocol_for(&self, user_id: &str, node: &str) -> Option<String> {
        match self.ledger.assignments_for_user(user_id).await {
            Ok(rows) => rows
                .into_iter()
                .find(|a| a.node == node)
                .map(|a| a.protocol),
            Err(e) => {
                error!(user_id, node, "Assignment lookup failed: {}", e);
                None
            }
        }
    }
}
