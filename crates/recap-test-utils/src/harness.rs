// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the front-end (conversation machine, dispatcher,
//! event relay) and one worker over a temp SQLite database, with mock
//! adapters for every external collaborator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use recap_agent::{ConversationMachine, ConversationReply, EventRelay, JobDispatcher};
use recap_config::model::RecapConfig;
use recap_core::types::{Request, RequestStatus};
use recap_core::{RecapError, StateStore};
use recap_ledger::RequestLedger;
use recap_resilience::RetryPolicy;
use recap_storage::{LocalFileStore, SqliteStore};
use recap_worker::{JobPipeline, WorkerLoop};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_delivery::MockDelivery;
use crate::mock_source::MockDataSource;
use crate::mock_summarizer::MockSummarizer;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    source: MockDataSource,
    summarizer: MockSummarizer,
    policy: RetryPolicy,
    config: RecapConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = RecapConfig::default();
        config.storage.event_poll_interval_ms = 10;
        config.worker.idle_poll_ms = 10;
        Self {
            source: MockDataSource::new(),
            summarizer: MockSummarizer::new(),
            policy: RetryPolicy::immediate(3),
            config,
        }
    }

    pub fn with_source(mut self, source: MockDataSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_summarizer(mut self, summarizer: MockSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Retry policy for the worker. Defaults to three attempts without waits.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adjust the configuration. Storage paths are overridden by `build`.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut RecapConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, RecapError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RecapError::Storage { source: e.into() })?;
        let output_dir = temp_dir.path().join("output");

        let mut config = self.config;
        config.storage.database_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        config.storage.output_dir = output_dir.to_string_lossy().to_string();

        let store = Arc::new(SqliteStore::new(config.storage.clone()));
        store.initialize().await?;

        let source = Arc::new(self.source);
        let summarizer = Arc::new(self.summarizer);
        let delivery = Arc::new(MockDelivery::new());
        let files = Arc::new(LocalFileStore::new(&output_dir));

        let ledger = RequestLedger::new(store.clone());
        let dispatcher = JobDispatcher::new(store.clone(), store.clone(), ledger.clone(), None);
        let machine = Arc::new(ConversationMachine::new(
            store.clone(),
            ledger.clone(),
            source.clone(),
            dispatcher.clone(),
            config.conversation.clone(),
        ));
        let relay = Arc::new(EventRelay::new(
            store.clone(),
            ledger.clone(),
            delivery.clone(),
            config.storage.event_retention(),
        ));
        let pipeline = Arc::new(JobPipeline::new(
            store.clone(),
            source.clone(),
            summarizer.clone(),
            files,
            self.policy,
            config.worker.clone(),
        ));
        let worker = Arc::new(WorkerLoop::new(
            "test-worker",
            store.clone(),
            store.clone(),
            pipeline,
            config.worker.clone(),
        ));

        Ok(TestHarness {
            store,
            ledger,
            source,
            summarizer,
            delivery,
            dispatcher,
            machine,
            relay,
            worker,
            config,
            output_dir,
            relay_task: None,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// SQLite store and work queue (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    pub ledger: RequestLedger,
    pub source: Arc<MockDataSource>,
    pub summarizer: Arc<MockSummarizer>,
    pub delivery: Arc<MockDelivery>,
    pub dispatcher: JobDispatcher,
    pub machine: Arc<ConversationMachine>,
    pub relay: Arc<EventRelay>,
    pub worker: Arc<WorkerLoop>,
    pub config: RecapConfig,
    /// Directory the participants artifacts are written to.
    pub output_dir: PathBuf,
    relay_task: Option<(CancellationToken, JoinHandle<()>)>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run one conversation turn for `user_id`.
    pub async fn send(&self, user_id: &str, text: &str) -> ConversationReply {
        self.machine.handle_message(user_id, text).await
    }

    /// Start the event relay in the background and wait until it is
    /// subscribed, so no event published afterwards is missed.
    pub async fn start_relay(&mut self) {
        if self.relay_task.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let relay = self.relay.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { relay.run(token).await });
        self.relay_task = Some((cancel, task));
        // The relay subscribes on its first poll; give it a few poll periods.
        tokio::time::sleep(self.config.storage.event_poll_interval() * 5).await;
    }

    /// Stop the background relay, if running.
    pub async fn stop_relay(&mut self) {
        if let Some((cancel, task)) = self.relay_task.take() {
            cancel.cancel();
            let _ = task.await;
        }
    }

    /// Claim and run one queued job. Returns `false` when the queue is empty.
    pub async fn run_worker_once(&self) -> Result<bool, RecapError> {
        self.worker.process_next().await
    }

    /// Poll the ledger until `request_id` reaches `status`.
    pub async fn wait_for_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        timeout: Duration,
    ) -> Result<Request, RecapError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let request = self.ledger.get(request_id).await?;
            if request.status == status {
                return Ok(request);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RecapError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until at least `count` terminal deliveries were recorded.
    pub async fn wait_for_terminal_deliveries(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<(), RecapError> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.delivery.terminal_records().await.len() < count {
            if tokio::time::Instant::now() >= deadline {
                return Err(RecapError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        if let Some((cancel, task)) = self.relay_task.take() {
            cancel.cancel();
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.store.latest_request_for_user("7").await.unwrap().is_none());
        assert!(!harness.run_worker_once().await.unwrap());
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();
        assert_ne!(h1.config.storage.database_path, h2.config.storage.database_path);
    }

    #[tokio::test]
    async fn unknown_target_is_reported_to_the_actor() {
        let harness = TestHarness::builder().build().await.unwrap();
        let reply = harness.send("7", "@nowhere").await;
        assert!(matches!(reply, ConversationReply::Error(ref m) if m.contains("@nowhere")));
    }
}
