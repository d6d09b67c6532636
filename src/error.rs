/*!
 * Error types for the Meridian binary
 */

use std::fmt;
use std::io;

use meridian_agent::AgentError;
use meridian_ledger::LedgerError;
use meridian_orchestrator::ProvisionError;

pub type Result<T> = std::result::Result<T, MeridianError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
/// The command ran but left work undone (rows still pending, nothing matched)
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum MeridianError {
    /// Configuration error
    Config(String),

    /// I/O error (bind, log file)
    Io(io::Error),

    /// Ledger could not be opened or queried
    Ledger(LedgerError),

    /// Node agent client could not be built
    Agent(AgentError),

    /// Orchestrator operation failed
    Provision(ProvisionError),
}

impl MeridianError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MeridianError::Provision(ProvisionError::NotFound(_)) => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }
}

impl fmt::Display for MeridianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeridianError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MeridianError::Io(err) => write!(f, "I/O error: {}", err),
            MeridianError::Ledger(err) => write!(f, "Ledger error: {}", err),
            MeridianError::Agent(err) => write!(f, "Agent error: {}", err),
            MeridianError::Provision(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for MeridianError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeridianError::Io(err) => Some(err),
            MeridianError::Ledger(err) => Some(err),
            MeridianError::Agent(err) => Some(err),
            MeridianError::Provision(err) => Some(err),
            MeridianError::Config(_) => None,
        }
    }
}

impl From<io::Error> for MeridianError {
    fn from(err: io::Error) -> Self {
        MeridianError::Io(err)
    }
}

impl From<LedgerError> for MeridianError {
    fn from(err: LedgerError) -> Self {
        MeridianError::Ledger(err)
    }
}

impl From<AgentError> for MeridianError {
    fn from(err: AgentError) -> Self {
        MeridianError::Agent(err)
    }
}

impl From<ProvisionError> for MeridianError {
    fn from(err: ProvisionError) -> Self {
        MeridianError::Provision(err)
    }
}
