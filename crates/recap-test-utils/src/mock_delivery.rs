// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outward delivery that records every call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use recap_core::RecapError;
use recap_core::traits::adapter::PluginAdapter;
use recap_core::traits::delivery::DeliveryAdapter;
use recap_core::types::{AdapterType, HealthStatus, Request, StatusUpdate};

/// A successful delivery, as recorded by [`MockDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRecord {
    Progress {
        request_id: String,
        user_id: String,
        update: StatusUpdate,
    },
    Result {
        request_id: String,
        user_id: String,
        summary: String,
        participants_file: Option<PathBuf>,
    },
    Failure {
        request_id: String,
        user_id: String,
        error_kind: String,
        message: String,
    },
}

/// Records deliveries. `fail_next(n)` makes the next `n` calls fail without
/// being recorded.
pub struct MockDelivery {
    records: Arc<Mutex<Vec<DeliveryRecord>>>,
    failures_left: Arc<Mutex<usize>>,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn fail_next(&self, n: usize) {
        *self.failures_left.lock().await = n;
    }

    pub async fn records(&self) -> Vec<DeliveryRecord> {
        self.records.lock().await.clone()
    }

    /// Terminal deliveries (results and failures) only.
    pub async fn terminal_records(&self) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| !matches!(r, DeliveryRecord::Progress { .. }))
            .cloned()
            .collect()
    }

    async fn record(&self, record: DeliveryRecord) -> Result<(), RecapError> {
        {
            let mut left = self.failures_left.lock().await;
            if *left > 0 {
                *left -= 1;
                return Err(RecapError::Channel {
                    message: "mock delivery failure".into(),
                    source: None,
                });
            }
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

impl Default for MockDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockDelivery {
    fn name(&self) -> &str {
        "mock-delivery"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Delivery
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryAdapter for MockDelivery {
    async fn deliver_progress(
        &self,
        request: &Request,
        update: &StatusUpdate,
    ) -> Result<(), RecapError> {
        self.record(DeliveryRecord::Progress {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            update: update.clone(),
        })
        .await
    }

    async fn deliver_result(
        &self,
        request: &Request,
        summary: &str,
        participants_file: Option<&Path>,
    ) -> Result<(), RecapError> {
        self.record(DeliveryRecord::Result {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            summary: summary.to_string(),
            participants_file: participants_file.map(Path::to_path_buf),
        })
        .await
    }

    async fn deliver_failure(
        &self,
        request: &Request,
        error_kind: &str,
        message: &str,
    ) -> Result<(), RecapError> {
        self.record(DeliveryRecord::Failure {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            error_kind: error_kind.to_string(),
            message: message.to_string(),
        })
        .await
    }
}
