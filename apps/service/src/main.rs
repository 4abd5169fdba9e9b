use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

mod alert;
mod catalog;
mod config;
mod database;
mod error;
mod monitoring;
mod orchestrator;
mod pool;
#[cfg(test)]
mod test_support;

use config::Config;
use monitoring::ProbeResult;
use orchestrator::Orchestrator;

/// Probe a fixed set of HTTP endpoints and alert when any of them changes state
#[derive(Debug, Parser)]
#[command(name = "uppe-uptime", version, about)]
struct Cli {
    /// Path to the TOML configuration file (created with defaults if missing)
    #[arg(short, long, global = true, env = "UPPE_UPTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a single run and exit; non-zero exit status on any run error
    Run,
    /// Execute a run every `monitor.interval_seconds` until interrupted
    Watch,
    /// Create the database schema and exit
    Init,
    /// Show the last recorded state of every endpoint
    Status,
    /// Show recent history for one endpoint
    History {
        /// Endpoint name
        name: String,
        /// Number of records to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    logger::init_tracing_with_level(level);

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_config(cli.config.as_ref())?;

    match cli.command {
        Command::Run => {
            let orchestrator = Orchestrator::from_config(&config).await?;
            let outcome = orchestrator.run_once().await?;
            for e in &outcome.errors {
                error!(run_id = %outcome.run_id, "Run error: {}", e);
            }
            Ok(if outcome.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Watch => {
            let orchestrator = Orchestrator::from_config(&config).await?;
            orchestrator.watch(Duration::from_secs(config.monitor.interval_seconds)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Init => {
            database::open_store(&config.database.path, 1).await?;
            info!("Database ready at {}", config.database.path);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let store = database::open_store(&config.database.path, 1).await?;
            let states = store.all_states().await?;
            if states.is_empty() {
                println!("No runs recorded yet");
            }
            for result in &states {
                println!("{}", format_result(result));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::History { name, limit } => {
            let store = database::open_store(&config.database.path, 1).await?;
            for result in store.recent_history(&name, limit).await? {
                println!("{}", format_result(&result));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            print!("{config}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn format_result(result: &ProbeResult) -> String {
    let tested_at: DateTime<Utc> = result.tested_at.into();
    let mut line = format!(
        "{:<24} {:<4} {:>4} {:>6}ms  {}  {}",
        result.name,
        result.state_label(),
        result.status_code,
        result.duration_millis(),
        tested_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        result.url
    );
    if !result.error_message.is_empty() {
        line.push_str("  ");
        line.push_str(&result.error_message);
    }
    line
}
