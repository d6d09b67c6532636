//! Meridian Agent: client side of the per-node credential agent
//!
//! Every remote node runs a small agent that creates and removes user
//! credentials on the local proxy. This crate exposes that wire contract as
//! the [`NodeAgent`] trait and ships an HTTP implementation,
//! [`HttpNodeAgent`], that speaks JSON with bearer-token auth.
//!
//! The orchestrator only ever talks to `dyn NodeAgent`, so tests substitute
//! a scripted fake without touching the network.
//!
//! # Example
//!
//! ```rust,no_run
//! use meridian_agent::{AgentConfig, HttpNodeAgent, NodeAgent};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let agent = HttpNodeAgent::new(AgentConfig::new("secret-token"))?;
//!     let created = agent.create_user("10.0.0.5", "vless", "user-1").await?;
//!     println!("created {} on {}", created.id, created.protocol);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use meridian_core_synth::ConnectionDescriptor;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod http;

pub use error::{AgentError, Result};
pub use http::{AgentConfig, HttpNodeAgent};

/// Credential created on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: String,
    #[serde(rename = "inbound")]
    pub protocol: String,
    #[serde(rename = "connection_config", default)]
    pub descriptor: ConnectionDescriptor,
}

/// A user known to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(rename = "inbound")]
    pub protocol: String,
}

/// An inbound (listener) configured on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInbound {
    #[serde(rename = "inbound")]
    pub protocol: String,
    #[serde(rename = "connection_config", default)]
    pub descriptor: ConnectionDescriptor,
}

/// Wire contract of a node agent
///
/// Every method is scoped to one node address and is stateless per call.
/// Failures are node-scoped; callers decide how to aggregate them.
#[async_trait]
pub trait NodeAgent: Send + Sync {
    async fn create_user(&self, node: &str, protocol: &str, user_id: &str)
        -> Result<CreatedUser>;

    /// Remove a user; a node that does not know the user counts as success
    async fn delete_user(&self, node: &str, user_id: &str) -> Result<()>;

    async fn list_users(&self, node: &str) -> Result<Vec<RemoteUser>>;

    async fn list_inbounds(&self, node: &str) -> Result<Vec<RemoteInbound>>;
}
