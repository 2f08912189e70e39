// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event relay: applies worker progress events to the ledger and notifies
//! the actor.
//!
//! The relay never raises. Malformed events, events for unknown requests and
//! delivery failures are logged and dropped. After a restart it only sees
//! live events; the ledger's persisted status covers anything missed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use recap_core::types::{
    EVENT_CHANNEL_PREFIX, JobResult, ProgressEvent, RawEvent, Stage, StatusUpdate,
};
use recap_core::{DeliveryAdapter, ErrorKind, RecapError, StateStore};
use recap_ledger::RequestLedger;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often old events are pruned from the log.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Wait before re-subscribing after the event stream failed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Subscribes to request progress events and relays them.
pub struct EventRelay {
    store: Arc<dyn StateStore>,
    ledger: RequestLedger,
    delivery: Arc<dyn DeliveryAdapter>,
    retention: Duration,
}

impl EventRelay {
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: RequestLedger,
        delivery: Arc<dyn DeliveryAdapter>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            delivery,
            retention,
        }
    }

    /// Relay events until `cancel` fires, re-subscribing whenever the
    /// stream fails or ends.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut prune = tokio::time::interval(PRUNE_INTERVAL);

        'subscription: loop {
            let mut events = match self.store.subscribe(EVENT_CHANNEL_PREFIX).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "event subscription failed, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => break 'subscription,
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => continue 'subscription,
                    }
                }
            };
            info!(prefix = EVENT_CHANNEL_PREFIX, "event relay subscribed");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'subscription,
                    _ = prune.tick() => self.prune().await,
                    next = events.next() => match next {
                        Some(Ok(raw)) => self.on_event(&raw).await,
                        Some(Err(e)) => warn!(error = %e, "event stream error"),
                        None => {
                            warn!("event stream ended, re-subscribing");
                            continue 'subscription;
                        }
                    },
                }
            }
        }
        info!("event relay stopped");
    }

    async fn prune(&self) {
        match self.store.prune_events(self.retention).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "pruned old events"),
            Err(e) => warn!(error = %e, "event pruning failed"),
        }
    }

    /// Decode and apply one raw event. Never fails.
    pub async fn on_event(&self, raw: &RawEvent) {
        let event: ProgressEvent = match serde_json::from_str(&raw.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(event_id = raw.id, channel = %raw.channel, error = %e, "dropping malformed event");
                return;
            }
        };
        if raw.channel != event.channel() {
            warn!(
                event_id = raw.id,
                channel = %raw.channel,
                request_id = %event.request_id,
                "dropping event published on a foreign channel"
            );
            return;
        }

        if let Err(e) = self.apply(&event).await {
            match e {
                RecapError::RequestNotFound(_) => {
                    warn!(request_id = %event.request_id, stage = %event.stage, "event for unknown request")
                }
                e => error!(
                    request_id = %event.request_id,
                    job_id = %event.job_id,
                    stage = %event.stage,
                    error = %e,
                    "failed to apply event"
                ),
            }
        }
    }

    /// Apply a decoded event to the ledger and notify the actor.
    pub async fn apply(&self, event: &ProgressEvent) -> Result<(), RecapError> {
        let request_id = event.request_id.as_str();
        let status = event.stage.status();
        let bound = self.ledger.get(request_id).await?;
        if bound.job_id.as_deref() != Some(event.job_id.as_str()) {
            warn!(
                request_id,
                job_id = %event.job_id,
                bound_job = ?bound.job_id,
                stage = %event.stage,
                "event from a job not bound to the request, dropping"
            );
            return Ok(());
        }
        self.ledger.apply_event(event).await?;

        if event.stage.is_terminal() {
            return self.deliver_terminal(event).await;
        }

        let request = self.ledger.get(request_id).await?;
        let stale_progress = event.stage == Stage::Progress
            && matches!(
                (event.progress, request.progress),
                (Some(seen), Some(recorded)) if seen < recorded
            );
        // WAITING describes whichever extraction phase the worker is in.
        let status = if event.stage == Stage::Waiting && request.status.reads_source() {
            request.status
        } else {
            status
        };
        if request.status != status || stale_progress {
            debug!(
                request_id,
                stage = %event.stage,
                current = %request.status,
                "stale event, not delivered"
            );
            return Ok(());
        }

        let update = StatusUpdate {
            status,
            stage: event.stage,
            detail: event.detail.clone(),
            progress: event.progress,
        };
        if let Err(e) = self.delivery.deliver_progress(&request, &update).await {
            warn!(request_id, error = %e, "progress delivery failed");
        }
        Ok(())
    }

    /// Deliver the persisted terminal result once per request.
    async fn deliver_terminal(&self, event: &ProgressEvent) -> Result<(), RecapError> {
        let request = self.ledger.get(&event.request_id).await?;
        let persisted = self
            .store
            .get_job(&event.job_id)
            .await?
            .and_then(|job| job.result);

        let result = match persisted {
            Some(result) => result,
            None if event.stage == Stage::Failed => JobResult::Failure {
                error_kind: ErrorKind::Internal.to_string(),
                message: event.detail.clone().unwrap_or_else(|| "job failed".into()),
            },
            None => {
                warn!(
                    request_id = %event.request_id,
                    job_id = %event.job_id,
                    "success event without a persisted result, dropping"
                );
                return Ok(());
            }
        };

        if !self.ledger.claim_delivery(&request.request_id).await? {
            debug!(request_id = %request.request_id, "terminal outcome already delivered");
            return Ok(());
        }

        let delivered = match &result {
            JobResult::Success {
                summary,
                participants_file,
                ..
            } => {
                self.delivery
                    .deliver_result(&request, summary, participants_file.as_deref().map(Path::new))
                    .await
            }
            JobResult::Failure {
                error_kind,
                message,
            } => {
                self.delivery
                    .deliver_failure(&request, error_kind, message)
                    .await
            }
        };

        match delivered {
            Ok(()) => {
                info!(
                    request_id = %request.request_id,
                    job_id = %event.job_id,
                    outcome = %result.stage(),
                    "terminal outcome delivered"
                );
                Ok(())
            }
            Err(e) => {
                self.ledger.release_delivery(&request.request_id).await?;
                Err(e)
            }
        }
    }
}
