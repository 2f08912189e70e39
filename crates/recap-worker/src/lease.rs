// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background lease renewal for a claimed queue entry.

use std::sync::Arc;
use std::time::Duration;

use recap_core::WorkQueue;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Keeps a queue entry's visibility lease alive while its job runs.
///
/// The lease is extended every third of the visibility timeout, so one
/// missed renewal does not let another worker claim the job.
pub struct LeaseKeeper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LeaseKeeper {
    pub fn start(queue: Arc<dyn WorkQueue>, entry_id: i64, visibility: Duration) -> Self {
        let cancel = CancellationToken::new();
        let period = (visibility / 3).max(Duration::from_millis(10));
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; the lease is fresh.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match queue.extend_lease(entry_id, visibility).await {
                            Ok(()) => debug!(entry_id, "lease extended"),
                            Err(e) => warn!(entry_id, error = %e, "lease renewal failed"),
                        }
                    }
                }
            }
        });

        Self { cancel, task }
    }

    /// Stop renewing and wait for the renewal task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "lease renewal task failed");
        }
    }
}
