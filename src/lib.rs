/*!
 * Meridian - credential provisioning control plane
 *
 * Creates and revokes per-user proxy credentials across a fleet of remote
 * nodes:
 * - Parallel fan-out to node agents under one shared deadline
 * - Per-protocol connection descriptors for every node that succeeded
 * - Durable pending-retry bookkeeping for failed revocations
 * - HTTP API plus an operator CLI over the same SQLite ledger
 */

pub mod app;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;

pub use app::App;
pub use config::{LogLevel, MeridianConfig, Overrides};
pub use error::{MeridianError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
