// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Work queue boundary between the dispatcher and the workers.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RecapError;
use crate::types::{QueueEntry, QueueStats};

/// At-least-once work queue keyed by `job_id`.
///
/// A claimed entry that is neither acked nor released becomes visible again
/// once its lease expires, so a crashed worker's job is redelivered.
#[async_trait]
pub trait WorkQueue: Send + Sync + 'static {
    /// Submits a job. Returns `false` when the job id is already queued,
    /// running, or finished.
    async fn submit(&self, job_id: &str, payload: &str) -> Result<bool, RecapError>;

    /// Claims the next available entry, leasing it for `visibility`.
    async fn dequeue(&self, visibility: Duration) -> Result<Option<QueueEntry>, RecapError>;

    /// Pushes the lease of a claimed entry `visibility` into the future.
    async fn extend_lease(&self, entry_id: i64, visibility: Duration) -> Result<(), RecapError>;

    /// Marks an entry as done.
    async fn ack(&self, entry_id: i64) -> Result<(), RecapError>;

    /// Returns a claimed entry to the queue immediately.
    async fn release(&self, entry_id: i64) -> Result<(), RecapError>;

    /// Entry counts per status.
    async fn stats(&self) -> Result<QueueStats, RecapError>;
}
