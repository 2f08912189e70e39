// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared state store trait: records, conditional updates, and pub/sub.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::RecapError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    JobPayload, JobRecord, JobResult, PendingConversation, ProgressEvent, RawEvent, Request,
    RequestStatus,
};

/// Live stream of undecoded events from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawEvent, RecapError>> + Send>>;

/// The store shared by the front-end and worker processes.
///
/// Every mutation touches exactly one record and is conditional where the
/// name says so; the boolean result reports whether the condition held.
/// This is the only synchronization primitive the orchestration relies on.
#[async_trait]
pub trait StateStore: PluginAdapter {
    /// Prepares the backend (migrations, connections). Idempotent.
    async fn initialize(&self) -> Result<(), RecapError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), RecapError>;

    // --- Requests ---

    async fn insert_request(&self, request: &Request) -> Result<(), RecapError>;

    async fn get_request(&self, request_id: &str) -> Result<Option<Request>, RecapError>;

    /// Most recently created request of a user.
    async fn latest_request_for_user(&self, user_id: &str)
    -> Result<Option<Request>, RecapError>;

    /// Sets the prompt if the request is still `PENDING_PROMPT` without one.
    async fn attach_prompt(&self, request_id: &str, prompt: &str) -> Result<bool, RecapError>;

    /// Sets the job id unless a different one is already attached.
    async fn attach_job(&self, request_id: &str, job_id: &str) -> Result<bool, RecapError>;

    /// Moves the request to `to` if its current status is one of `from`.
    async fn transition_status(
        &self,
        request_id: &str,
        from: &[RequestStatus],
        to: RequestStatus,
        detail: Option<&str>,
    ) -> Result<bool, RecapError>;

    /// Records a progress count if it is larger than the stored one and the
    /// request is not terminal.
    async fn record_progress(
        &self,
        request_id: &str,
        progress: i64,
        detail: Option<&str>,
    ) -> Result<bool, RecapError>;

    /// Sets the delivered marker if unset.
    async fn claim_delivery(&self, request_id: &str) -> Result<bool, RecapError>;

    /// Clears the delivered marker after a failed delivery.
    async fn release_delivery(&self, request_id: &str) -> Result<(), RecapError>;

    // --- Pending conversations ---

    /// Creates or overwrites the user's pending conversation.
    async fn put_pending(&self, pending: &PendingConversation) -> Result<(), RecapError>;

    /// Returns the user's pending conversation if it has not expired.
    async fn get_pending(&self, user_id: &str)
    -> Result<Option<PendingConversation>, RecapError>;

    /// Deletes the user's pending conversation if it still points at `request_id`.
    async fn delete_pending(&self, user_id: &str, request_id: &str) -> Result<bool, RecapError>;

    // --- Jobs ---

    /// Persists a job payload. Returns `false` if the job id already exists.
    async fn insert_job(&self, payload: &JobPayload) -> Result<bool, RecapError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, RecapError>;

    /// Increments and returns the job's attempt counter.
    async fn record_job_attempt(&self, job_id: &str) -> Result<u32, RecapError>;

    /// Persists the terminal result. Returns `false` if one is already stored.
    async fn set_job_result(&self, job_id: &str, result: &JobResult) -> Result<bool, RecapError>;

    // --- Pub/sub ---

    /// Publishes a raw payload on a channel.
    async fn publish_raw(&self, channel: &str, payload: &str) -> Result<(), RecapError>;

    /// Publishes a progress event on its request channel.
    async fn publish(&self, event: &ProgressEvent) -> Result<(), RecapError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| RecapError::Internal(format!("failed to encode event: {e}")))?;
        self.publish_raw(&event.channel(), &payload).await
    }

    /// Subscribes to every channel starting with `prefix`.
    ///
    /// Only events published after the call are delivered.
    async fn subscribe(&self, prefix: &str) -> Result<EventStream, RecapError>;

    /// Deletes events older than `older_than`. Returns the number removed.
    async fn prune_events(&self, older_than: Duration) -> Result<u64, RecapError>;
}
