//! Error types for the meridian-agent crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Transport error talking to {node}: {source}")]
    Transport {
        node: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Node {node} answered {status}: {body}")]
    Status {
        node: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {node}: {reason}")]
    Decode { node: String, reason: String },

    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Transport { source, .. } if source.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
