// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local-disk artifact store and retention cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use recap_core::{FileStore, RecapError};

fn io_err(e: std::io::Error) -> RecapError {
    RecapError::Storage {
        source: Box::new(e),
    }
}

/// Write-once files under one output directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write_new(&self, name: &str, contents: &[u8]) -> Result<PathBuf, RecapError> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(RecapError::Internal(format!("invalid artifact name `{name}`")));
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let path = self.dir.join(name);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(contents).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        debug!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }
}

/// Delete regular files in `dir` last modified more than `older_than` ago.
///
/// A missing directory counts as empty. Returns the number of files removed.
pub async fn cleanup_old_files(dir: &Path, older_than: Duration) -> Result<usize, RecapError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(io_err(e)),
    };
    let cutoff = SystemTime::now()
        .checked_sub(older_than)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let meta = entry.metadata().await.map_err(io_err)?;
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified < cutoff {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove old artifact"),
            }
        }
    }
    Ok(removed)
}
