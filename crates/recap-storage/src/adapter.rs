// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `StateStore` and `WorkQueue` traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use recap_config::model::StorageConfig;
use recap_core::types::{
    JobPayload, JobRecord, JobResult, PendingConversation, QueueEntry, QueueStats, Request,
    RequestStatus,
};
use recap_core::{
    AdapterType, EventStream, HealthStatus, PluginAdapter, RecapError, StateStore, WorkQueue,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed state store and work queue.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on the first call to [`StateStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured database path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RecapError> {
        self.db.get().ok_or_else(|| RecapError::Storage {
            source: "store not initialized -- call initialize() first".into(),
        })
    }

    /// Delete expired pending conversations. Returns the number removed.
    pub async fn purge_expired_pending(&self) -> Result<u64, RecapError> {
        queries::pending::purge_expired(self.db()?).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        if self.db.get().is_some() {
            StateStore::close(self).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn initialize(&self) -> Result<(), RecapError> {
        let path = self.config.database_path.clone();
        let wal_mode = self.config.wal_mode;
        self.db
            .get_or_try_init(|| Database::open_with_journal(&path, wal_mode))
            .await?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RecapError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Requests ---

    async fn insert_request(&self, request: &Request) -> Result<(), RecapError> {
        queries::requests::insert_request(self.db()?, request).await
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<Request>, RecapError> {
        queries::requests::get_request(self.db()?, request_id).await
    }

    async fn latest_request_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Request>, RecapError> {
        queries::requests::latest_for_user(self.db()?, user_id).await
    }

    async fn attach_prompt(&self, request_id: &str, prompt: &str) -> Result<bool, RecapError> {
        queries::requests::attach_prompt(self.db()?, request_id, prompt).await
    }

    async fn attach_job(&self, request_id: &str, job_id: &str) -> Result<bool, RecapError> {
        queries::requests::attach_job(self.db()?, request_id, job_id).await
    }

    async fn transition_status(
        &self,
        request_id: &str,
        from: &[RequestStatus],
        to: RequestStatus,
        detail: Option<&str>,
    ) -> Result<bool, RecapError> {
        queries::requests::transition_status(self.db()?, request_id, from, to, detail).await
    }

    async fn record_progress(
        &self,
        request_id: &str,
        progress: i64,
        detail: Option<&str>,
    ) -> Result<bool, RecapError> {
        queries::requests::record_progress(self.db()?, request_id, progress, detail).await
    }

    async fn claim_delivery(&self, request_id: &str) -> Result<bool, RecapError> {
        queries::requests::claim_delivery(self.db()?, request_id).await
    }

    async fn release_delivery(&self, request_id: &str) -> Result<(), RecapError> {
        queries::requests::release_delivery(self.db()?, request_id).await
    }

    // --- Pending conversations ---

    async fn put_pending(&self, pending: &PendingConversation) -> Result<(), RecapError> {
        queries::pending::put_pending(self.db()?, pending).await
    }

    async fn get_pending(
        &self,
        user_id: &str,
    ) -> Result<Option<PendingConversation>, RecapError> {
        queries::pending::get_pending(self.db()?, user_id).await
    }

    async fn delete_pending(&self, user_id: &str, request_id: &str) -> Result<bool, RecapError> {
        queries::pending::delete_pending(self.db()?, user_id, request_id).await
    }

    // --- Jobs ---

    async fn insert_job(&self, payload: &JobPayload) -> Result<bool, RecapError> {
        queries::jobs::insert_job(self.db()?, payload).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, RecapError> {
        queries::jobs::get_job(self.db()?, job_id).await
    }

    async fn record_job_attempt(&self, job_id: &str) -> Result<u32, RecapError> {
        queries::jobs::record_attempt(self.db()?, job_id).await
    }

    async fn set_job_result(&self, job_id: &str, result: &JobResult) -> Result<bool, RecapError> {
        queries::jobs::set_result(self.db()?, job_id, result).await
    }

    // --- Pub/sub ---

    async fn publish_raw(&self, channel: &str, payload: &str) -> Result<(), RecapError> {
        queries::events::publish(self.db()?, channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> Result<EventStream, RecapError> {
        let stream =
            queries::events::subscribe(self.db()?, prefix, self.config.event_poll_interval())
                .await?;
        Ok(Box::pin(stream))
    }

    async fn prune_events(&self, older_than: Duration) -> Result<u64, RecapError> {
        queries::events::prune(self.db()?, older_than).await
    }
}

#[async_trait]
impl WorkQueue for SqliteStore {
    async fn submit(&self, job_id: &str, payload: &str) -> Result<bool, RecapError> {
        queries::queue::submit(self.db()?, job_id, payload).await
    }

    async fn dequeue(&self, visibility: Duration) -> Result<Option<QueueEntry>, RecapError> {
        queries::queue::dequeue(self.db()?, visibility).await
    }

    async fn extend_lease(&self, entry_id: i64, visibility: Duration) -> Result<(), RecapError> {
        queries::queue::extend_lease(self.db()?, entry_id, visibility).await
    }

    async fn ack(&self, entry_id: i64) -> Result<(), RecapError> {
        queries::queue::ack(self.db()?, entry_id).await
    }

    async fn release(&self, entry_id: i64) -> Result<(), RecapError> {
        queries::queue::release(self.db()?, entry_id).await
    }

    async fn stats(&self) -> Result<QueueStats, RecapError> {
        queries::queue::stats(self.db()?).await
    }
}
