// crates/correlator-cli/src/main.rs
// ============================================================================
// Module: Correlator CLI Entry Point
// Description: Command dispatcher for the correlator server and maintenance.
// Purpose: Serve the HTTP API and run store maintenance from one binary.
// Dependencies: clap, correlator-server, correlator-store-sqlite, tokio,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! The `correlator` binary starts the HTTP server (`serve`), refreshes the
//! correlation views on demand (`refresh-views`), and prunes aged
//! idempotency fingerprints (`prune-idempotency`). Identity configuration is
//! resolved from `--config`, then `CORRELATOR_CONFIG_PATH`, then the default
//! `./correlator.yaml`, degrading to empty when absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use correlator_core::LineageStore;
use correlator_server::CorrelatorServer;
use correlator_server::ServerConfig;
use correlator_store_sqlite::SqliteLineageStore;
use correlator_store_sqlite::SqliteStoreConfig;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "correlator", version, about = "Cross-tool data-pipeline incident correlator")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the correlator HTTP server.
    Serve(ServeCommand),
    /// Refresh the correlation views in dependency order.
    RefreshViews(StoreCommand),
    /// Delete idempotency fingerprints older than the retention window.
    PruneIdempotency(PruneCommand),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the SQLite database file.
    #[arg(long, value_name = "PATH", default_value = "./correlator.db")]
    db: PathBuf,
    /// Bind address for the HTTP listener.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// Identity configuration file (defaults to CORRELATOR_CONFIG_PATH or
    /// ./correlator.yaml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for store-only commands.
#[derive(Args, Debug)]
struct StoreCommand {
    /// Path to the SQLite database file.
    #[arg(long, value_name = "PATH", default_value = "./correlator.db")]
    db: PathBuf,
}

/// Arguments for the `prune-idempotency` command.
#[derive(Args, Debug)]
struct PruneCommand {
    /// Path to the SQLite database file.
    #[arg(long, value_name = "PATH", default_value = "./correlator.db")]
    db: PathBuf,
    /// Retention window in days; older fingerprints are deleted.
    #[arg(long, value_name = "DAYS", default_value_t = 30)]
    older_than_days: u32,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => run_serve(command),
        Commands::RefreshViews(command) => run_refresh_views(&command),
        Commands::PruneIdempotency(command) => run_prune(&command),
    }
}

/// Initializes the tracing subscriber from `RUST_LOG` with an info default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Runs the HTTP server until it exits.
fn run_serve(command: ServeCommand) -> ExitCode {
    let mut config = ServerConfig::new(command.db);
    config.config_path = command.config;
    if let Some(bind) = command.bind {
        config.bind = bind;
    }
    let server = match CorrelatorServer::from_config(config) {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(%error, "server construction failed");
            return ExitCode::FAILURE;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "tokio runtime construction failed");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(server.serve()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "server exited with error");
            ExitCode::FAILURE
        }
    }
}

/// Opens the store at the given path.
fn open_store(db: &PathBuf) -> Result<SqliteLineageStore, ExitCode> {
    SqliteLineageStore::open(SqliteStoreConfig::new(db)).map_err(|error| {
        tracing::error!(%error, "store open failed");
        ExitCode::FAILURE
    })
}

/// Refreshes the correlation views once.
fn run_refresh_views(command: &StoreCommand) -> ExitCode {
    let store = match open_store(&command.db) {
        Ok(store) => store,
        Err(code) => return code,
    };
    match store.refresh_views() {
        Ok(report) => {
            for refresh in &report.refreshed {
                tracing::info!(view = refresh.view.as_str(), duration_ms = refresh.duration_ms, "view refreshed");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "view refresh failed");
            ExitCode::FAILURE
        }
    }
}

/// Prunes idempotency fingerprints older than the retention window.
fn run_prune(command: &PruneCommand) -> ExitCode {
    let store = match open_store(&command.db) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let cutoff = OffsetDateTime::now_utc() - time::Duration::days(i64::from(command.older_than_days));
    match store.prune_idempotency_keys(cutoff) {
        Ok(removed) => {
            tracing::info!(removed, "idempotency fingerprints pruned");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "idempotency pruning failed");
            ExitCode::FAILURE
        }
    }
}
