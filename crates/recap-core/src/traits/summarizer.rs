// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarization client trait.

use async_trait::async_trait;

use crate::error::RecapError;
use crate::traits::adapter::PluginAdapter;

/// Turns extracted text plus the actor's prompt into a summary.
///
/// Failures are reported as [`RecapError::Transport`], [`RecapError::Http`]
/// or [`RecapError::Timeout`] so the retry policy can classify them.
#[async_trait]
pub trait Summarizer: PluginAdapter {
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String, RecapError>;
}
