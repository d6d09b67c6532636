//! Error types for connection string synthesis

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Missing field in connection descriptor: {0}")]
    MissingField(&'static str),

    #[error("No usable transport in connection descriptor")]
    NoUsableTransport,
}

pub type Result<T> = std::result::Result<T, SynthError>;
