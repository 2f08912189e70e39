// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker loop: claims jobs from the queue and runs them one at a time.

use std::sync::Arc;

use recap_config::model::WorkerConfig;
use recap_core::types::{JobPayload, QueueEntry};
use recap_core::{RecapError, StateStore, WorkQueue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::lease::LeaseKeeper;
use crate::pipeline::{JobPipeline, crashed_result};

/// One worker: dequeues a job, runs it to completion, acks it, repeats.
///
/// Several loops may share one store and queue, in one process or many.
pub struct WorkerLoop {
    name: String,
    store: Arc<dyn StateStore>,
    queue: Arc<dyn WorkQueue>,
    pipeline: Arc<JobPipeline>,
    config: WorkerConfig,
}

impl WorkerLoop {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn StateStore>,
        queue: Arc<dyn WorkQueue>,
        pipeline: Arc<JobPipeline>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            queue,
            pipeline,
            config,
        }
    }

    /// Process jobs until `cancel` fires. A running job is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(worker = %self.name, "worker loop running");
        while !cancel.is_cancelled() {
            let wait = match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => self.config.idle_poll(),
                Err(e) => {
                    error!(worker = %self.name, error = %e, "worker iteration failed");
                    self.config.idle_poll()
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!(worker = %self.name, "worker loop stopped");
    }

    /// Claim and process one job. Returns `false` when the queue is empty.
    pub async fn process_next(&self) -> Result<bool, RecapError> {
        let visibility = self.config.visibility_timeout();
        let Some(entry) = self.queue.dequeue(visibility).await? else {
            return Ok(false);
        };

        let payload: JobPayload = match serde_json::from_str(&entry.payload) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    worker = %self.name,
                    job_id = %entry.job_id,
                    error = %e,
                    "dropping job with undecodable payload"
                );
                self.queue.ack(entry.id).await?;
                return Ok(true);
            }
        };

        let lease = LeaseKeeper::start(self.queue.clone(), entry.id, visibility);
        let outcome = self.handle(&entry, &payload).await;
        lease.stop().await;

        match outcome {
            Ok(()) => self.queue.ack(entry.id).await?,
            Err(e) => {
                // The lease lapses and the queue redelivers the job.
                warn!(
                    worker = %self.name,
                    job_id = %payload.job_id,
                    error = %e,
                    "attempt abandoned"
                );
            }
        }
        Ok(true)
    }

    async fn handle(&self, entry: &QueueEntry, payload: &JobPayload) -> Result<(), RecapError> {
        let Some(job) = self.store.get_job(&payload.job_id).await? else {
            error!(
                worker = %self.name,
                job_id = %payload.job_id,
                "queued job has no job record, dropping it"
            );
            return Ok(());
        };
        if let Some(result) = job.result {
            info!(
                worker = %self.name,
                job_id = %payload.job_id,
                "job already finished, republishing its result"
            );
            self.pipeline.complete(payload, result).await?;
            return Ok(());
        }

        if entry.deliveries > self.config.max_deliveries {
            error!(
                worker = %self.name,
                job_id = %payload.job_id,
                deliveries = entry.deliveries,
                "job keeps crashing its workers, failing it"
            );
            self.pipeline
                .complete(payload, crashed_result(entry.deliveries))
                .await?;
            return Ok(());
        }

        let attempt = self.store.record_job_attempt(&payload.job_id).await?;
        debug!(
            worker = %self.name,
            job_id = %payload.job_id,
            attempt,
            deliveries = entry.deliveries,
            "running job"
        );
        self.pipeline.run(payload).await?;
        Ok(())
    }
}
