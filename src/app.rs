/*!
 * Wiring of the ledger, node agent client and orchestrator
 */

use std::sync::Arc;

use meridian_agent::{AgentConfig, HttpNodeAgent, NodeAgent};
use meridian_ledger::{Ledger, SqliteLedger};
use meridian_orchestrator::{Orchestrator, OrchestratorConfig};
use meridian_server::{AppState, ServerConfig};

use crate::config::MeridianConfig;
use crate::error::Result;

/// Everything a command needs, built once from configuration
#[derive(Clone)]
pub struct App {
    pub config: MeridianConfig,
    pub ledger: Arc<dyn Ledger>,
    pub agent: Arc<dyn NodeAgent>,
    pub orchestrator: Orchestrator,
}

impl App {
    /// Open the ledger and build the HTTP agent client from `config`
    pub async fn build(config: MeridianConfig) -> Result<Self> {
        let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::open(&config.db_path).await?);
        let agent: Arc<dyn NodeAgent> = Arc::new(HttpNodeAgent::new(agent_config(&config))?);

        tracing::info!(
            db_path = %config.db_path.display(),
            agent_port = config.agent_port,
            "Ledger opened"
        );

        Ok(Self::with_parts(config, ledger, agent))
    }

    /// Assemble from already constructed parts
    pub fn with_parts(
        config: MeridianConfig,
        ledger: Arc<dyn Ledger>,
        agent: Arc<dyn NodeAgent>,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            ledger.clone(),
            agent.clone(),
            OrchestratorConfig {
                request_timeout: config.request_timeout(),
            },
        );

        Self {
            config,
            ledger,
            agent,
            orchestrator,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.orchestrator.clone(),
            self.ledger.clone(),
            self.agent.clone(),
            self.config.api_key.as_str(),
        )
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.config.host.clone(),
            port: self.config.port,
        }
    }
}

fn agent_config(config: &MeridianConfig) -> AgentConfig {
    AgentConfig::new(config.node_token.clone())
        .with_scheme(config.agent_scheme.clone())
        .with_port(config.agent_port)
        .with_timeout(config.node_timeout())
        .with_max_idle_per_node(config.max_idle_per_node)
}
