// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-history export gateway adapter.
//!
//! Implements [`DataSource`] over a small HTTP API that fronts the chat
//! network's user client:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | resolve | `GET /v1/targets/resolve?query=` |
//! | open session | `POST /v1/sessions` |
//! | history page | `GET /v1/sessions/{id}/history?target_id=&cursor=&limit=` |
//! | participants | `GET /v1/sessions/{id}/participants?target_id=` |
//! | close | `DELETE /v1/sessions/{id}` |

pub mod client;
pub mod target;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recap_config::model::SourceConfig;
use recap_core::error::RecapError;
use recap_core::traits::{DataSource, PluginAdapter, SourceSession};
use recap_core::types::{AdapterType, HealthStatus, HistoryPage, Participant, Target};
use tracing::{debug, info, warn};

use crate::client::GatewayClient;
use crate::target::normalize_target;
use crate::types::{OpenSessionRequest, OpenSessionResponse, ParticipantsResponse, ResolveResponse};

/// [`DataSource`] backed by the export gateway.
pub struct GatewaySource {
    client: Arc<GatewayClient>,
    page_size: u32,
}

impl GatewaySource {
    /// Creates the adapter from `[source]` configuration.
    ///
    /// Fails with [`RecapError::Config`] when `base_url` is not set.
    pub fn new(config: &SourceConfig) -> Result<Self, RecapError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| RecapError::Config("source.base_url is not set".into()))?;
        let client = GatewayClient::new(
            base_url,
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(base_url, page_size = config.page_size, "source gateway initialized");

        Ok(Self {
            client: Arc::new(client),
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl PluginAdapter for GatewaySource {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DataSource
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        let url = self.client.endpoint(&["v1", "health"], &[]);
        match self.client.send(self.client.get(url)).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        debug!("source gateway shutting down");
        Ok(())
    }
}

#[async_trait]
impl DataSource for GatewaySource {
    async fn resolve(&self, raw_input: &str) -> Result<Target, RecapError> {
        let invalid = |reason: &str| RecapError::TargetInvalid {
            input: raw_input.trim().to_string(),
            reason: reason.to_string(),
        };
        let query =
            normalize_target(raw_input).ok_or_else(|| invalid("not a chat link, @username or id"))?;

        let url = self
            .client
            .endpoint(&["v1", "targets", "resolve"], &[("query", query.as_str())]);
        match self
            .client
            .send_json::<ResolveResponse>(self.client.get(url))
            .await
        {
            Ok(resp) => Ok(resp.into_target()),
            Err(RecapError::Http { status: 404, .. }) => Err(invalid("no such chat")),
            Err(RecapError::Http { status: 403, .. }) => Err(invalid("chat is not accessible")),
            Err(e) => Err(e),
        }
    }

    async fn open_session(
        &self,
        credentials: Option<&str>,
    ) -> Result<Box<dyn SourceSession>, RecapError> {
        let url = self.client.endpoint(&["v1", "sessions"], &[]);
        let request = self
            .client
            .post(url)
            .json(&OpenSessionRequest { credentials });
        let resp: OpenSessionResponse = self.client.send_json(request).await?;
        debug!(session_id = %resp.session_id, "source session opened");
        Ok(Box::new(GatewaySession {
            client: self.client.clone(),
            session_id: resp.session_id,
            page_size: self.page_size,
            closed: false,
        }))
    }
}

/// One gateway session, owned by a single job attempt.
pub struct GatewaySession {
    client: Arc<GatewayClient>,
    session_id: String,
    page_size: u32,
    closed: bool,
}

#[async_trait]
impl SourceSession for GatewaySession {
    async fn fetch_history_page(
        &mut self,
        target_id: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, RecapError> {
        let limit = self.page_size.to_string();
        let mut query = vec![("target_id", target_id), ("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let url = self
            .client
            .endpoint(&["v1", "sessions", self.session_id.as_str(), "history"], &query);
        self.client.send_json(self.client.get(url)).await
    }

    async fn list_participants(
        &mut self,
        target_id: &str,
    ) -> Result<Vec<Participant>, RecapError> {
        let url = self.client.endpoint(
            &["v1", "sessions", self.session_id.as_str(), "participants"],
            &[("target_id", target_id)],
        );
        let resp: ParticipantsResponse = self.client.send_json(self.client.get(url)).await?;
        Ok(resp.participants)
    }

    async fn close(&mut self) -> Result<(), RecapError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let url = self
            .client
            .endpoint(&["v1", "sessions", self.session_id.as_str()], &[]);
        match self.client.send(self.client.delete(url)).await {
            Ok(_) | Err(RecapError::Http { status: 404, .. }) => {
                debug!(session_id = %self.session_id, "source session closed");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "failed to close source session");
                Err(e)
            }
        }
    }
}
