//! Shared fixtures: a scripted node agent and a temp-file ledger

#![allow(dead_code)]

use async_trait::async_trait;
use meridian_agent::{AgentError, CreatedUser, NodeAgent, RemoteInbound, RemoteUser};
use meridian_core_synth::ConnectionDescriptor;
use meridian_ledger::{Ledger, Node, SqliteLedger};
use meridian_orchestrator::{Orchestrator, OrchestratorConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const TEST_TIMEOUT: Duration = Duration::from_millis(300);

/// How a node reacts to a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
    /// Create succeeds but returns an empty descriptor
    EmptyDescriptor,
}

#[derive(Default)]
pub struct FakeAgent {
    create: Mutex<HashMap<String, Behavior>>,
    delete: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
}

impl FakeAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_create(&self, node: &str, behavior: Behavior) {
        self.create.lock().unwrap().insert(node.to_string(), behavior);
    }

    pub fn on_delete(&self, node: &str, behavior: Behavior) {
        self.delete.lock().unwrap().insert(node.to_string(), behavior);
    }

    /// Every call made so far, as `"<op>:<node>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    fn log(&self, op: &str, node: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", op, node));
    }

    fn behavior(map: &Mutex<HashMap<String, Behavior>>, node: &str) -> Behavior {
        map.lock()
            .unwrap()
            .get(node)
            .copied()
            .unwrap_or(Behavior::Succeed)
    }

    fn refused(node: &str) -> AgentError {
        AgentError::Status {
            node: node.to_string(),
            status: 500,
            body: "refused".to_string(),
        }
    }
}

fn descriptor_for(protocol: &str) -> ConnectionDescriptor {
    let value = match protocol {
        "trojan" => json!({ "password": "pw1", "tcp": { "port": 443 } }),
        _ => json!({ "tcp_reality": { "port": 443, "reality": { "serverName": "sni" } } }),
    };
    ConnectionDescriptor::from_value(value).unwrap()
}

#[async_trait]
impl NodeAgent for FakeAgent {
    async fn create_user(
        &self,
        node: &str,
        protocol: &str,
        user_id: &str,
    ) -> meridian_agent::Result<CreatedUser> {
        self.log("create", node);
        let descriptor = match Self::behavior(&self.create, node) {
            Behavior::Succeed => descriptor_for(protocol),
            Behavior::EmptyDescriptor => ConnectionDescriptor::default(),
            Behavior::Fail => return Err(Self::refused(node)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return Err(Self::refused(node));
            }
        };
        Ok(CreatedUser {
            id: user_id.to_string(),
            protocol: protocol.to_string(),
            descriptor,
        })
    }

    async fn delete_user(&self, node: &str, _user_id: &str) -> meridian_agent::Result<()> {
        self.log("delete", node);
        match Self::behavior(&self.delete, node) {
            Behavior::Succeed | Behavior::EmptyDescriptor => Ok(()),
            Behavior::Fail => Err(Self::refused(node)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(Self::refused(node))
            }
        }
    }

    async fn list_users(&self, node: &str) -> meridian_agent::Result<Vec<RemoteUser>> {
        self.log("list_users", node);
        Ok(Vec::new())
    }

    async fn list_inbounds(&self, node: &str) -> meridian_agent::Result<Vec<RemoteInbound>> {
        self.log("list_inbounds", node);
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub _tmp: NamedTempFile,
    pub ledger: Arc<SqliteLedger>,
    pub agent: Arc<FakeAgent>,
    pub orchestrator: Orchestrator,
}

/// Orchestrator over a fresh ledger holding `nodes`
pub async fn harness(nodes: &[Node]) -> anyhow::Result<Harness> {
    let tmp = NamedTempFile::new()?;
    let ledger = Arc::new(SqliteLedger::open(tmp.path()).await?);
    ledger.upsert_nodes(nodes).await?;

    let agent = FakeAgent::new();
    let orchestrator = Orchestrator::new(
        ledger.clone(),
        agent.clone(),
        OrchestratorConfig {
            request_timeout: TEST_TIMEOUT,
        },
    );

    Ok(Harness {
        _tmp: tmp,
        ledger,
        agent,
        orchestrator,
    })
}

pub fn three_nodes() -> Vec<Node> {
    vec![
        Node::new("n1", "DE", "vless"),
        Node::new("n2", "NL", "trojan"),
        Node::new("n3", "FI", "vless"),
    ]
}
