//! Backend implementations for the Ledger
//!
//! - `sqlite`: SQLite-based backend (default, requires `sqlite` feature)

#[cfg(feature = "sqlite")]
pub mod sqlite;
