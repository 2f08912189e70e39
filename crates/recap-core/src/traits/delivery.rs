// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outward-delivery trait: how job progress and results reach the actor.

use std::path::Path;

use async_trait::async_trait;

use crate::error::RecapError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Request, StatusUpdate};

/// Delivers job progress and terminal outcomes to the actor.
///
/// Implementations own all presentation: status text, icons, chunking and
/// file attachments. The request carries the recipient (`user_id`) and the
/// target title for rendering.
#[async_trait]
pub trait DeliveryAdapter: PluginAdapter {
    /// Shows a non-terminal status change.
    async fn deliver_progress(
        &self,
        request: &Request,
        update: &StatusUpdate,
    ) -> Result<(), RecapError>;

    /// Delivers the summary and, if present, the participants artifact.
    async fn deliver_result(
        &self,
        request: &Request,
        summary: &str,
        participants_file: Option<&Path>,
    ) -> Result<(), RecapError>;

    /// Delivers a terminal failure.
    async fn deliver_failure(
        &self,
        request: &Request,
        error_kind: &str,
        message: &str,
    ) -> Result<(), RecapError>;
}
