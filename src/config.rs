/*!
 * Configuration types for Meridian
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MeridianError, Result};

/// Main service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeridianConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Value callers must send in `X-Api-Key`
    #[serde(default)]
    pub api_key: String,

    /// Bearer token presented to node agents
    #[serde(default)]
    pub node_token: String,

    /// SQLite ledger location
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Deadline for a whole create/delete fan-out
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a single node agent call
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,

    /// Port node agents listen on
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,

    #[serde(default = "default_agent_scheme")]
    pub agent_scheme: String,

    /// Idle pooled connections kept per node
    #[serde(default = "default_max_idle")]
    pub max_idle_per_node: usize,

    #[serde(default)]
    pub log: LogConfig,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = MeridianError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(MeridianError::Config(format!("unknown log level: {}", other))),
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// Every field left `None` keeps the value from the file or the default.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub node_token: Option<String>,
    pub db_path: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub node_timeout_secs: Option<u64>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./meridian.db")
}

fn default_request_timeout() -> u64 {
    10
}

fn default_node_timeout() -> u64 {
    3
}

fn default_agent_port() -> u16 {
    8000
}

fn default_agent_scheme() -> String {
    "http".to_string()
}

fn default_max_idle() -> usize {
    10
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: String::new(),
            node_token: String::new(),
            db_path: default_db_path(),
            request_timeout_secs: default_request_timeout(),
            node_timeout_secs: default_node_timeout(),
            agent_port: default_agent_port(),
            agent_scheme: default_agent_scheme(),
            max_idle_per_node: default_max_idle(),
            log: LogConfig::default(),
        }
    }
}

impl MeridianConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MeridianError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| MeridianError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Defaults, then the optional file, then overrides
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(key) = overrides.api_key {
            self.api_key = key;
        }
        if let Some(token) = overrides.node_token {
            self.node_token = token;
        }
        if let Some(path) = overrides.db_path {
            self.db_path = path;
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = overrides.node_timeout_secs {
            self.node_timeout_secs = secs;
        }
        if let Some(level) = overrides.log_level {
            self.log.level = level;
        }
        if let Some(file) = overrides.log_file {
            self.log.file = Some(file);
        }
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(MeridianError::Config(
                "api_key is required (MERIDIAN_API_KEY)".to_string(),
            ));
        }
        if self.node_token.trim().is_empty() {
            return Err(MeridianError::Config(
                "node_token is required (MERIDIAN_NODE_TOKEN)".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 || self.node_timeout_secs == 0 {
            return Err(MeridianError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if !matches!(self.agent_scheme.as_str(), "http" | "https") {
            return Err(MeridianError::Config(format!(
                "agent_scheme must be http or https, got {}",
                self.agent_scheme
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid() -> MeridianConfig {
        MeridianConfig {
            api_key: "k".to_string(),
            node_token: "t".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = MeridianConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.node_timeout(), Duration::from_secs(3));
        assert_eq!(config.agent_port, 8000);
        assert_eq!(config.log.level, LogLevel::Info);
        assert!(config.log.file.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            api_key = "secret"
            node_token = "tok"
            request_timeout_secs = 4

            [log]
            level = "debug"
        "#;
        let config: MeridianConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.request_timeout_secs, 4);
        assert_eq!(config.node_timeout_secs, 3);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"from-file\"\nport = 9000").unwrap();

        let config = MeridianConfig::load(
            Some(file.path()),
            Overrides {
                api_key: Some("from-env".to_string()),
                log_level: Some(LogLevel::Trace),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log.level, LogLevel::Trace);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = MeridianConfig::load(Some(Path::new("/nonexistent/meridian.toml")), Overrides::default());
        assert!(matches!(err, Err(MeridianError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_secrets_and_zero_timeouts() {
        assert!(MeridianConfig::default().validate().is_err());

        let mut config = valid();
        assert!(config.validate().is_ok());

        config.node_token.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.agent_scheme = "ftp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
