// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `recap worker` command implementation.

use std::sync::Arc;

use recap_anthropic::AnthropicSummarizer;
use recap_config::RecapConfig;
use recap_core::error::RecapError;
use recap_core::traits::StateStore;
use recap_resilience::RetryPolicy;
use recap_source::GatewaySource;
use recap_storage::LocalFileStore;
use recap_worker::{JobPipeline, WorkerLoop};
use tokio::task::JoinSet;
use tracing::{error, info};

/// Runs `concurrency` worker loops over one store until SIGINT/SIGTERM.
///
/// Each loop finishes its current job before exiting; a job interrupted
/// by a hard kill reappears on the queue after the visibility timeout.
pub async fn run_workers(config: RecapConfig, concurrency: usize) -> Result<(), RecapError> {
    if concurrency == 0 {
        return Err(RecapError::Config("worker concurrency must be at least 1".into()));
    }
    info!(concurrency, "starting recap worker");

    let store = crate::open_store(&config).await?;
    let source = Arc::new(GatewaySource::new(&config.source)?);
    let summarizer = Arc::new(AnthropicSummarizer::new(&config.anthropic).map_err(|e| {
        error!(error = %e, "failed to initialize summarizer");
        e
    })?);
    let files = Arc::new(LocalFileStore::new(&config.storage.output_dir));

    let pipeline = Arc::new(JobPipeline::new(
        store.clone(),
        source,
        summarizer,
        files,
        RetryPolicy::from_config(&config.retry),
        config.worker.clone(),
    ));

    let cancel = recap_agent::install_signal_handler();
    let mut loops = JoinSet::new();
    for index in 0..concurrency {
        let worker = WorkerLoop::new(
            format!("worker-{index}"),
            store.clone(),
            store.clone(),
            pipeline.clone(),
            config.worker.clone(),
        );
        let cancel = cancel.clone();
        loops.spawn(async move { worker.run(cancel).await });
    }

    while let Some(joined) = loops.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "worker loop panicked");
        }
    }

    store.close().await?;
    info!("recap worker stopped");
    Ok(())
}
