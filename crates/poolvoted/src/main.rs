//! poolvoted — the poolvote node daemon.
//!
//! Loads the cloud config once, then either answers a single stat query or
//! runs the periodic nomination loop.
//!
//! # Usage
//!
//! ```text
//! poolvoted --config /etc/poolvote/clouds.json query nominations
//! poolvoted watch --interval 30
//! poolvoted rules
//! ```

mod watch;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use poolvote_engine::{Engine, QueryHandler, QueryResponse, SystemProbe};
use tracing::info;

#[derive(Parser)]
#[command(name = "poolvoted", about = "poolvote node daemon", version)]
struct Cli {
    /// Cloud config document (JSON, or TOML with a .toml extension).
    #[arg(long, env = "POOLVOTE_CONFIG", default_value = "/etc/poolvote/clouds.json")]
    config: PathBuf,

    /// Shell command printing the active node names, whitespace separated.
    #[arg(long, env = "POOLVOTE_LIST_ACTIVE_CMD", default_value = SystemProbe::DEFAULT_LIST_ACTIVE_CMD)]
    list_active_cmd: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "POOLVOTE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query one stat, or the default bundle when no name is given.
    Query {
        /// Stat name, e.g. load, nominations, can_expand?
        params: Vec<String>,
    },
    /// Recompute and log nominations on a fixed interval.
    Watch {
        /// Seconds between passes.
        #[arg(long, default_value = "30")]
        interval: u64,
    },
    /// Print the effective rule registry and bounds.
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let probe = Arc::new(SystemProbe::new(cli.list_active_cmd.clone()));
    let engine = Arc::new(Engine::from_config_file(&cli.config, probe));

    match cli.command {
        Command::Query { params } => {
            let handler = QueryHandler::new(engine);
            let response =
                tokio::task::spawn_blocking(move || handler.handle(params.as_slice())).await?;
            println!("{}", response.body);
            Ok(exit_status(&response))
        }
        Command::Watch { interval } => {
            run_watch(engine, Duration::from_secs(interval)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Rules => {
            let summary = serde_json::json!({
                "source": engine.registry().source(),
                "categories": engine.registry().categories().collect::<Vec<_>>(),
                "bounds": engine.bounds(),
                "stats": engine.table().names().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// A failed query exits non-zero after its error body is printed.
fn exit_status(response: &QueryResponse) -> ExitCode {
    if response.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,poolvote=debug"))?;

    // Query output goes to stdout, so logs stay on stderr.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn run_watch(engine: Arc<Engine>, interval: Duration) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(watch::run(engine, interval, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let passes = handle.await?;
    info!(passes, "poolvoted stopped");
    Ok(())
}
