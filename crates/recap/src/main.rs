// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recap - chat history extraction and summarization bot.
//!
//! This is the binary entry point. `serve` runs the Telegram front-end and
//! the event relay, `worker` runs the extraction pipeline; both share one
//! SQLite database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod cleanup;
mod serve;
mod status;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recap_config::RecapConfig;
use tracing::error;

/// Recap - chat history extraction and summarization bot.
#[derive(Parser, Debug)]
#[command(name = "recap", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the standard search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Telegram front-end and the event relay.
    Serve,
    /// Run extraction workers against the shared queue.
    Worker {
        /// Number of concurrent worker loops (overrides `worker.concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print a request's ledger record and job result as JSON.
    Status {
        /// The request id shown to the actor.
        request_id: String,
    },
    /// Delete job artifacts older than the given age.
    Cleanup {
        /// Age threshold in days.
        #[arg(long, default_value_t = 3)]
        days: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => recap_config::load_and_validate_path(path),
        None => recap_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            recap_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Worker { concurrency } => {
            let concurrency = concurrency.unwrap_or(config.worker.concurrency);
            worker::run_workers(config, concurrency).await
        }
        Commands::Status { request_id } => status::run_status(&config, &request_id).await,
        Commands::Cleanup { days } => cleanup::run_cleanup(&config, days).await,
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence. Logs go to stderr so `status` output stays
/// machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_filter(log_level: &str) -> String {
    format!("recap={log_level},warn")
}

/// Opens the shared store and applies migrations.
async fn open_store(
    config: &RecapConfig,
) -> Result<std::sync::Arc<recap_storage::SqliteStore>, recap_core::RecapError> {
    use recap_core::StateStore;

    let store = recap_storage::SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    Ok(std::sync::Arc::new(store))
}
