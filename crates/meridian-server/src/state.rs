//! Application state shared across all handlers

use meridian_agent::NodeAgent;
use meridian_ledger::Ledger;
use meridian_orchestrator::Orchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,

    /// Ledger for registry administration and read-only listings
    pub ledger: Arc<dyn Ledger>,

    /// Direct node access for the inspection routes
    pub agent: Arc<dyn NodeAgent>,

    /// Expected value of the `X-Api-Key` header
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        ledger: Arc<dyn Ledger>,
        agent: Arc<dyn NodeAgent>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            agent,
            api_key: api_key.into(),
        }
    }
}
