//! Error types for the ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
