// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request ledger: the lifecycle record of one extraction request.
//!
//! The ledger owns the status ordering rule. A request only ever moves
//! forward in the order `PENDING_PROMPT < QUEUED < STARTED <
//! EXTRACTING_HISTORY < EXTRACTING_PARTICIPANTS < CALLING_LLM < SUCCESS`,
//! with `CANCELLED` and `FAILED` reachable from any non-terminal state.
//! Stale or duplicate advances are no-ops, never errors, which is what lets
//! the front-end relay and the workers both advance the same record.

use std::sync::Arc;

use recap_core::types::{ProgressEvent, Request, RequestStatus, Stage};
use recap_core::{RecapError, StateStore};
use tracing::{debug, info};

/// Request ledger over the shared [`StateStore`].
#[derive(Clone)]
pub struct RequestLedger {
    store: Arc<dyn StateStore>,
}

impl RequestLedger {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly created request.
    pub async fn create(&self, request: &Request) -> Result<(), RecapError> {
        self.store.insert_request(request).await?;
        info!(
            request_id = %request.request_id,
            user_id = %request.user_id,
            target_id = %request.target_id,
            status = %request.status,
            "request created"
        );
        Ok(())
    }

    /// Fetch a request, failing with `RequestNotFound` when it does not exist.
    pub async fn get(&self, request_id: &str) -> Result<Request, RecapError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| RecapError::RequestNotFound(request_id.to_string()))
    }

    /// The most recent request of a user, if any.
    pub async fn latest_for_user(&self, user_id: &str) -> Result<Option<Request>, RecapError> {
        self.store.latest_request_for_user(user_id).await
    }

    /// Attach the prompt. Only the first caller for a `PENDING_PROMPT`
    /// request wins.
    pub async fn attach_prompt(&self, request_id: &str, prompt: &str) -> Result<bool, RecapError> {
        self.store.attach_prompt(request_id, prompt).await
    }

    /// Associate the request with its job. Re-attaching the same job is a no-op.
    pub async fn attach_job(&self, request_id: &str, job_id: &str) -> Result<bool, RecapError> {
        let attached = self.store.attach_job(request_id, job_id).await?;
        if attached {
            debug!(request_id, job_id, "job attached");
        } else {
            debug!(request_id, job_id, "request already bound to a different job");
        }
        Ok(attached)
    }

    /// Move the request to `new_status` if that is an advance.
    ///
    /// Returns whether the status changed. A stale or repeated status, or
    /// any change after a terminal state, is logged and ignored. Fails with
    /// `RequestNotFound` only when the request does not exist.
    pub async fn advance(
        &self,
        request_id: &str,
        new_status: RequestStatus,
        detail: Option<&str>,
    ) -> Result<bool, RecapError> {
        let from = RequestStatus::predecessors_of(new_status);
        if self
            .store
            .transition_status(request_id, &from, new_status, detail)
            .await?
        {
            info!(request_id, status = %new_status, "request advanced");
            return Ok(true);
        }

        let current = self.get(request_id).await?;
        debug!(
            request_id,
            current = %current.status,
            requested = %new_status,
            "ignoring non-advancing status"
        );
        Ok(false)
    }

    /// Replace the detail text of a request that is at `status` or earlier,
    /// moving it to `status` if it was earlier.
    ///
    /// Used for sub-stage notes such as rate-limit waits that do not change
    /// the status itself.
    pub async fn annotate(
        &self,
        request_id: &str,
        status: RequestStatus,
        detail: &str,
    ) -> Result<bool, RecapError> {
        let mut from = RequestStatus::predecessors_of(status);
        if !status.is_terminal() {
            from.push(status);
        }
        self.store
            .transition_status(request_id, &from, status, Some(detail))
            .await
    }

    /// Apply a worker progress event to the request it belongs to.
    ///
    /// `PROGRESS` advances to `EXTRACTING_HISTORY` and records the running
    /// count; `WAITING` only replaces the detail text of the current
    /// extraction status. Returns whether the status changed.
    pub async fn apply_event(&self, event: &ProgressEvent) -> Result<bool, RecapError> {
        let request_id = event.request_id.as_str();
        let status = event.stage.status();
        match event.stage {
            Stage::Progress => {
                let advanced = self.advance(request_id, status, None).await?;
                if let Some(count) = event.progress {
                    self.record_progress(request_id, count, event.detail.as_deref())
                        .await?;
                }
                Ok(advanced)
            }
            Stage::Waiting => {
                let detail = event.detail.as_deref().unwrap_or("waiting");
                // A rate limit can hit while reading history or participants;
                // annotate whichever of the two the request is in.
                let current = self.get(request_id).await?.status;
                let at = if current.reads_source() { current } else { status };
                self.annotate(request_id, at, detail).await?;
                Ok(false)
            }
            _ => self.advance(request_id, status, event.detail.as_deref()).await,
        }
    }

    /// Cancel a request that is still waiting for its prompt.
    ///
    /// Dispatched requests cannot be cancelled; this returns `false` for them.
    pub async fn cancel_pending(&self, request_id: &str) -> Result<bool, RecapError> {
        let cancelled = self
            .store
            .transition_status(
                request_id,
                &[RequestStatus::PendingPrompt],
                RequestStatus::Cancelled,
                Some("cancelled by user"),
            )
            .await?;
        if cancelled {
            info!(request_id, "request cancelled");
        }
        Ok(cancelled)
    }

    /// Record a running record count if it grew.
    pub async fn record_progress(
        &self,
        request_id: &str,
        progress: i64,
        detail: Option<&str>,
    ) -> Result<bool, RecapError> {
        self.store.record_progress(request_id, progress, detail).await
    }

    /// Claim the right to deliver the terminal outcome. `true` exactly once
    /// until [`RequestLedger::release_delivery`] is called.
    pub async fn claim_delivery(&self, request_id: &str) -> Result<bool, RecapError> {
        self.store.claim_delivery(request_id).await
    }

    pub async fn release_delivery(&self, request_id: &str) -> Result<(), RecapError> {
        self.store.release_delivery(request_id).await
    }
}
