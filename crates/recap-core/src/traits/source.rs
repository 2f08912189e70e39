// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-source client traits: target resolution and history sessions.

use async_trait::async_trait;

use crate::error::RecapError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{HistoryPage, Participant, Target};

/// Client for the external chat-like data source.
#[async_trait]
pub trait DataSource: PluginAdapter {
    /// Resolves the actor's raw input (link, @username, numeric id) to a target.
    ///
    /// Returns [`RecapError::TargetInvalid`] when nothing matches.
    async fn resolve(&self, raw_input: &str) -> Result<Target, RecapError>;

    /// Opens an exclusive session for one job attempt.
    async fn open_session(
        &self,
        credentials: Option<&str>,
    ) -> Result<Box<dyn SourceSession>, RecapError>;
}

/// A session owned by exactly one job attempt.
///
/// History is read page by page. A failed fetch leaves the caller's cursor
/// untouched, so the same page can be requested again. Rate limits surface
/// as [`RecapError::RateLimited`].
#[async_trait]
pub trait SourceSession: Send {
    /// Fetches the page of history at `cursor` (`None` for the newest page).
    async fn fetch_history_page(
        &mut self,
        target_id: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, RecapError>;

    /// Lists members of a multi-participant target.
    async fn list_participants(&mut self, target_id: &str)
    -> Result<Vec<Participant>, RecapError>;

    /// Releases the session. Called exactly once on every exit path.
    async fn close(&mut self) -> Result<(), RecapError>;
}
