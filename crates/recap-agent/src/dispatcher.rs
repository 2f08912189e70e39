// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job dispatcher: turns a fully specified request into queued work.

use std::sync::Arc;

use recap_core::types::{JobPayload, Request};
use recap_core::{RecapError, StateStore, WorkQueue};
use recap_ledger::RequestLedger;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const JOB_ID_PREFIX: &str = "extract-";
const JOB_ID_HEX_LEN: usize = 24;

/// Deterministic job id for a request/target pair.
///
/// `extract-` followed by the first 24 hex digits of
/// `sha256("{request_id}:{target_id}")`.
pub fn job_id_for(request_id: &str, target_id: &str) -> String {
    let digest = Sha256::digest(format!("{request_id}:{target_id}").as_bytes());
    let hex = hex::encode(digest);
    format!("{JOB_ID_PREFIX}{}", &hex[..JOB_ID_HEX_LEN])
}

/// Enqueues requests as jobs, at most once per request.
#[derive(Clone)]
pub struct JobDispatcher {
    store: Arc<dyn StateStore>,
    queue: Arc<dyn WorkQueue>,
    ledger: RequestLedger,
    credentials: Option<String>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn StateStore>,
        queue: Arc<dyn WorkQueue>,
        ledger: RequestLedger,
        credentials: Option<String>,
    ) -> Self {
        Self {
            store,
            queue,
            ledger,
            credentials,
        }
    }

    /// Enqueue `request` and return its job id.
    ///
    /// Safe to call repeatedly for the same request: the job id is derived
    /// from the request, the job record is insert-if-absent and the queue
    /// accepts a job id once, so at most one execution ever starts.
    pub async fn enqueue(&self, request: &Request) -> Result<String, RecapError> {
        let prompt = request
            .prompt
            .clone()
            .ok_or_else(|| RecapError::PromptInvalid("no prompt attached".into()))?;
        let job_id = job_id_for(&request.request_id, &request.target_id);

        let payload = JobPayload {
            job_id: job_id.clone(),
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            target_id: request.target_id.clone(),
            target_multi: request.target_multi,
            prompt,
            credentials: self.credentials.clone(),
        };

        if !self.store.insert_job(&payload).await? {
            debug!(job_id = %job_id, "job record already exists");
        }
        // Bind before queueing so the relay accepts the first event.
        self.ledger.attach_job(&request.request_id, &job_id).await?;

        let encoded = serde_json::to_string(&payload)
            .map_err(|e| RecapError::Internal(format!("failed to encode job payload: {e}")))?;
        if self.queue.submit(&job_id, &encoded).await? {
            info!(
                request_id = %request.request_id,
                job_id = %job_id,
                "job enqueued"
            );
        } else {
            info!(job_id = %job_id, "job already queued, reusing it");
        }

        Ok(job_id)
    }
}
