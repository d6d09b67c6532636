use crate::error::{FailureKind, NodeFailure, ProvisionError, Result};
use crate::types::{ConnectionEntry, Provisioned};
use crate::{call_before, non_empty, Orchestrator};
use chrono::Utc;
use futures::future::join_all;
use meridian_core_synth::synthesize;
use meridian_ledger::{Assignment, Node};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl Orchestrator {
    /// Provision a credential for a user on one node or on every active node
    ///
    /// A missing or empty `existing_id` generates a fresh identifier. Fails
    /// only when no node can be targeted or when every node failed; a
    /// partial success returns the links that were produced and lists the
    /// failed nodes in [`Provisioned::failures`].
    pub async fn create_user(
        &self,
        existing_id: Option<String>,
        target: Option<&str>,
    ) -> Result<Provisioned> {
        let user_id = match existing_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let nodes = self.resolve_nodes(non_empty(target)).await?;

        self.pre_cleanup(&user_id, &nodes).await;

        let deadline = self.deadline();
        let outcomes = join_all(
            nodes
                .iter()
                .map(|node| self.provision_on(node, &user_id, deadline)),
        )
        .await;

        let mut connections = Vec::new();
        let mut assignments = Vec::new();
        let mut failures = Vec::new();
        let now = Utc::now();

        for (node, outcome) in nodes.iter().zip(outcomes) {
            match outcome {
                Ok(config) => {
                    connections.push(ConnectionEntry {
                        country_code: node.country_code.clone(),
                        config,
                    });
                    assignments.push(Assignment {
                        user_id: user_id.clone(),
                        node: node.address.clone(),
                        protocol: node.protocol.clone(),
                        created_at: now,
                    });
                }
                Err(failure) => {
                    warn!(user_id = %user_id, node = %failure.node, "Create failed: {}", failure.message);
                    failures.push(failure);
                }
            }
        }

        if connections.is_empty() {
            error!(user_id = %user_id, "Create failed on all {} nodes", nodes.len());
            return Err(ProvisionError::AllNodesFailed(failures));
        }

        if let Err(e) = self.ledger.insert_assignments(&assignments).await {
            error!(user_id = %user_id, "Failed to record assignments: {}", e);
        }

        info!(
            user_id = %user_id,
            succeeded = connections.len(),
            failed = failures.len(),
            "User provisioned"
        );

        Ok(Provisioned {
            user_id,
            connections,
            failures,
        })
    }

    async fn resolve_nodes(&self, target: Option<&str>) -> Result<Vec<Node>> {
        match target {
            Some(address) => {
                let node = self
                    .ledger
                    .get_node(address)
                    .await?
                    .ok_or_else(|| ProvisionError::NodeNotFound(address.to_string()))?;
                if !node.active {
                    return Err(ProvisionError::NodeInactive(address.to_string()));
                }
                Ok(vec![node])
            }
            None => {
                let nodes = self.ledger.list_nodes(true).await?;
                if nodes.is_empty() {
                    return Err(ProvisionError::NoActiveNodes);
                }
                Ok(nodes)
            }
        }
    }

    /// Best-effort removal of stale credentials left by an earlier failed run
    async fn pre_cleanup(&self, user_id: &str, nodes: &[Node]) {
        let deadline = self.deadline();
        let outcomes = join_all(nodes.iter().map(|node| {
            call_before(
                deadline,
                &node.address,
                self.agent.delete_user(&node.address, user_id),
            )
        }))
        .await;

        let stale = outcomes.iter().filter(|o| o.is_err()).count();
        debug!(user_id, nodes = nodes.len(), unreachable = stale, "Pre-cleanup finished");
    }

    async fn provision_on(
        &self,
        node: &Node,
        user_id: &str,
        deadline: tokio::time::Instant,
    ) -> std::result::Result<String, NodeFailure> {
        let created = call_before(
            deadline,
            &node.address,
            self.agent.create_user(&node.address, &node.protocol, user_id),
        )
        .await?;

        synthesize(&node.protocol, &node.address, user_id, &created.descriptor)
            .map_err(|e| NodeFailure::new(&node.address, FailureKind::Synthesis, e.to_string()))
    }
}
