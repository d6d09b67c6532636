//! Meridian Orchestrator: parallel provisioning with durable retry bookkeeping
//!
//! # Overview
//!
//! The orchestrator fans credential create/delete calls out to every relevant
//! node at once, waits for all of them, and only then touches the ledger:
//!
//! ```text
//! caller ─▶ Orchestrator ─▶ N concurrent NodeAgent calls (one deadline)
//!                        ─▶ synthesize per success
//!                        ─▶ one batched ledger write
//!                        ─▶ aggregated result
//! ```
//!
//! Node failures never escape the fan-out. They are collected, reported, and
//! for deletes recorded as pending retries that [`Orchestrator::cleanup_pending_retries`]
//! replays later, one row at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use meridian_agent::{AgentConfig, HttpNodeAgent};
//! use meridian_ledger::SqliteLedger;
//! use meridian_orchestrator::{Orchestrator, OrchestratorConfig};
//! use std::sync::Arc;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let ledger = Arc::new(SqliteLedger::open("meridian.db").await?);
//!     let agent = Arc::new(HttpNodeAgent::new(AgentConfig::new("token"))?);
//!     let orchestrator = Orchestrator::new(ledger, agent, OrchestratorConfig::default());
//!
//!     let provisioned = orchestrator.create_user(None, None).await?;
//!     for entry in &provisioned.connections {
//!         println!("{}: {}", entry.country_code, entry.config);
//!     }
//!     Ok(())
//! }
//! ```

use meridian_agent::NodeAgent;
use meridian_ledger::Ledger;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mod cleanup;
mod create;
mod delete;
pub mod error;
pub mod types;

pub use error::{FailureKind, NodeFailure, ProvisionError, Result};
pub use types::{CleanupReport, ConnectionEntry, DeleteOutcome, Provisioned};

/// Tuning knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline applied to a whole fan-out, and to each cleanup call
    pub request_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Coordinates node agents and the ledger
#[derive(Clone)]
pub struct Orchestrator {
    ledger: Arc<dyn Ledger>,
    agent: Arc<dyn NodeAgent>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        agent: Arc<dyn NodeAgent>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ledger,
            agent,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.request_timeout
    }
}

/// Run one node call, mapping a missed deadline and agent errors to a
/// node-scoped failure
async fn call_before<T, F>(deadline: Instant, node: &str, call: F) -> std::result::Result<T, NodeFailure>
where
    F: Future<Output = meridian_agent::Result<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.is_timeout() => Err(NodeFailure::timeout(node)),
        Ok(Err(e)) => Err(NodeFailure::new(node, FailureKind::Agent, e.to_string())),
        Err(_) => Err(NodeFailure::timeout(node)),
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProvisionError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Treat empty optional strings as absent
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
