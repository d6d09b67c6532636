/*!
 * Meridian CLI - Command Line Interface
 */

use clap::{Args, Parser, Subcommand};
use meridian::{
    cli_style::{self, cleanup_report_table, nodes_table, pending_table, print_error, print_info},
    error::{MeridianError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging, App, LogLevel, MeridianConfig, Overrides,
};
use meridian_ledger::Ledger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meridian")]
#[command(version, about = "Provision and revoke proxy credentials across a node fleet", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true, env = "MERIDIAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that take precedence over the configuration file
#[derive(Args)]
struct OverrideArgs {
    /// Bind address for the HTTP API
    #[arg(long, global = true, env = "MERIDIAN_HOST")]
    host: Option<String>,

    #[arg(long, global = true, env = "MERIDIAN_PORT")]
    port: Option<u16>,

    /// Key callers must present in X-Api-Key
    #[arg(long, global = true, env = "MERIDIAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Bearer token for node agents
    #[arg(long, global = true, env = "MERIDIAN_NODE_TOKEN", hide_env_values = true)]
    node_token: Option<String>,

    /// SQLite ledger path
    #[arg(long, global = true, env = "MERIDIAN_DB_PATH", value_name = "FILE")]
    db_path: Option<PathBuf>,

    /// Shared deadline for one fan-out, in seconds
    #[arg(long, global = true, env = "MERIDIAN_REQUEST_TIMEOUT", value_name = "SECS")]
    request_timeout: Option<u64>,

    /// Timeout for a single node call, in seconds
    #[arg(long, global = true, env = "MERIDIAN_NODE_TIMEOUT", value_name = "SECS")]
    node_timeout: Option<u64>,

    /// error, warn, info, debug or trace
    #[arg(long, global = true, env = "MERIDIAN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long, global = true, env = "MERIDIAN_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl OverrideArgs {
    fn into_overrides(self) -> Result<Overrides> {
        let log_level = self
            .log_level
            .as_deref()
            .map(str::parse::<LogLevel>)
            .transpose()?;

        Ok(Overrides {
            host: self.host,
            port: self.port,
            api_key: self.api_key,
            node_token: self.node_token,
            db_path: self.db_path,
            request_timeout_secs: self.request_timeout,
            node_timeout_secs: self.node_timeout,
            log_level,
            log_file: self.log_file,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Retry every pending node delete once and report the outcome
    Cleanup,

    /// List pending node deletes
    Pending,

    /// List the node registry
    Nodes {
        /// Only nodes that accept new users
        #[arg(long)]
        active: bool,
    },

    /// Drop pending deletes for a user on a node without contacting it
    Forget {
        user_id: String,
        node: String,
        /// Only the row for this protocol
        protocol: Option<String>,
    },
}

impl Commands {
    /// Commands that need the API key and node token
    fn contacts_nodes(&self) -> bool {
        matches!(self, Commands::Serve | Commands::Cleanup)
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            print_error(&e.to_string(), hint_for(&e));
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn hint_for(err: &MeridianError) -> Option<&'static str> {
    match err {
        MeridianError::Config(_) => Some("Check --config and the MERIDIAN_* environment variables"),
        MeridianError::Ledger(_) => Some("Check that --db-path points to a writable location"),
        _ => None,
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config = MeridianConfig::load(cli.config.as_deref(), cli.overrides.into_overrides()?)?;
    if cli.command.contacts_nodes() {
        config.validate()?;
    }
    logging::init_logging(&config)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| MeridianError::Config(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(async move {
        let app = App::build(config).await?;
        match cli.command {
            Commands::Serve => serve(app).await,
            Commands::Cleanup => cleanup(&app).await,
            Commands::Pending => pending(&app).await,
            Commands::Nodes { active } => nodes(&app, active).await,
            Commands::Forget {
                user_id,
                node,
                protocol,
            } => forget(&app, &user_id, &node, protocol.as_deref()).await,
        }
    })
}

async fn serve(app: App) -> Result<i32> {
    let server_config = app.server_config();
    meridian_server::run_server(server_config, app.state()).await?;
    Ok(EXIT_SUCCESS)
}

async fn cleanup(app: &App) -> Result<i32> {
    let report = app.orchestrator.cleanup_pending_retries().await?;
    println!("{}", cleanup_report_table(&report));

    if report.still_pending > 0 {
        cli_style::print_warning(&format!(
            "{} delete(s) still pending",
            report.still_pending
        ));
        Ok(EXIT_PARTIAL)
    } else {
        cli_style::print_success("No deletes pending");
        Ok(EXIT_SUCCESS)
    }
}

async fn pending(app: &App) -> Result<i32> {
    let rows = app.ledger.list_pending_retries().await?;
    if rows.is_empty() {
        print_info("No pending deletes");
    } else {
        println!("{}", pending_table(&rows));
        print_info(&format!("{} pending", rows.len()));
    }
    Ok(EXIT_SUCCESS)
}

async fn nodes(app: &App, active_only: bool) -> Result<i32> {
    let nodes = app.ledger.list_nodes(active_only).await?;
    if nodes.is_empty() {
        print_info("No nodes registered");
    } else {
        println!("{}", nodes_table(&nodes));
    }
    Ok(EXIT_SUCCESS)
}

async fn forget(app: &App, user_id: &str, node: &str, protocol: Option<&str>) -> Result<i32> {
    let removed = app
        .orchestrator
        .remove_pending_retry(user_id, node, protocol)
        .await?;
    cli_style::print_success(&format!("Removed {} pending delete(s)", removed));
    Ok(EXIT_SUCCESS)
}
