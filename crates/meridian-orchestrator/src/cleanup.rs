use crate::error::{ProvisionError, Result};
use crate::types::CleanupReport;
use crate::{call_before, non_empty, require, Orchestrator};
use meridian_ledger::{PendingRetry, RetryFailure, RetryKey};
use tracing::{error, info, warn};

impl Orchestrator {
    /// Retry every pending delete, one row at a time.
    ///
    /// Only reading the pending rows can fail the sweep; per-row failures
    /// are counted and described in [`CleanupReport::errors`].
    pub async fn cleanup_pending_retries(&self) -> Result<CleanupReport> {
        let pending = self.ledger.list_pending_retries().await?;
        let mut report = CleanupReport {
            total_attempted: pending.len(),
            ..CleanupReport::default()
        };

        for row in &pending {
            match self.retry_one(row).await {
                Ok(()) => report.successful += 1,
                Err(message) => {
                    report.failed += 1;
                    report.errors.push(format!(
                        "user={}, endpoint={}, inbound={}: {}",
                        row.key.user_id, row.key.node, row.key.protocol, message
                    ));
                }
            }
        }
        report.still_pending = report.failed;

        info!(
            attempted = report.total_attempted,
            successful = report.successful,
            failed = report.failed,
            "Cleanup sweep finished"
        );
        Ok(report)
    }

    async fn retry_one(&self, row: &PendingRetry) -> std::result::Result<(), String> {
        let key = &row.key;
        let outcome = call_before(
            self.deadline(),
            &key.node,
            self.agent.delete_user(&key.node, &key.user_id),
        )
        .await;

        match outcome {
            Ok(()) => {
                if let Err(e) = self.ledger.remove_pending_retry(key).await {
                    error!(user_id = %key.user_id, node = %key.node, "Failed to drop pending retry: {}", e);
                }
                if let Err(e) = self.ledger.delete_assignment(&key.user_id, &key.node).await {
                    error!(user_id = %key.user_id, node = %key.node, "Failed to drop assignment: {}", e);
                }
                Ok(())
            }
            Err(failure) => {
                warn!(
                    user_id = %key.user_id,
                    node = %key.node,
                    attempts = row.attempts + 1,
                    "Retry failed: {}",
                    failure.message
                );
                let retry = RetryFailure::new(key.clone(), failure.message.clone());
                if let Err(e) = self.ledger.record_pending_retry(&retry).await {
                    error!(user_id = %key.user_id, node = %key.node, "Failed to update pending retry: {}", e);
                }
                Err(failure.message)
            }
        }
    }

    /// Drop pending retries without contacting the node.
    ///
    /// With a protocol, exactly that row is removed; without one, every row
    /// for (user, node) is. Returns the number of rows removed and fails
    /// with [`ProvisionError::NotFound`] when nothing matched.
    pub async fn remove_pending_retry(
        &self,
        user_id: &str,
        node: &str,
        protocol: Option<&str>,
    ) -> Result<u64> {
        require("userId", user_id)?;
        require("endpoint", node)?;

        let removed = match non_empty(protocol) {
            Some(protocol) => {
                self.ledger
                    .remove_pending_retry(&RetryKey::new(user_id, node, protocol))
                    .await?
            }
            None => self.ledger.remove_pending_retries_for(user_id, node).await?,
        };

        if removed == 0 {
            return Err(ProvisionError::NotFound(format!(
                "pending retry for user={}, endpoint={}",
                user_id, node
            )));
        }

        info!(user_id, node, removed, "Pending retries removed by operator");
        Ok(removed)
    }
}
