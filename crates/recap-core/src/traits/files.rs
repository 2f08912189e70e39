// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable file store for job side artifacts.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::RecapError;

/// Write-once storage for artifacts such as participant lists.
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Writes `contents` under a name that must not exist yet.
    ///
    /// Fails instead of overwriting when the name is already taken.
    async fn write_new(&self, name: &str, contents: &[u8]) -> Result<PathBuf, RecapError>;
}
