// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Within a process all statements go through one `tokio-rusqlite` background
//! thread. Other processes open their own [`Database`] on the same file.

use std::time::Duration;

use recap_core::RecapError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// How long a statement waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into `RecapError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RecapError {
    RecapError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the shared SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and apply pending
    /// migrations.
    pub async fn open(path: &str) -> Result<Self, RecapError> {
        Self::open_with_journal(path, true).await
    }

    /// Like [`Database::open`], choosing between WAL and rollback journaling.
    pub async fn open_with_journal(path: &str, wal_mode: bool) -> Result<Self, RecapError> {
        let journal = if wal_mode {
            "PRAGMA journal_mode = WAL;"
        } else {
            "PRAGMA journal_mode = DELETE;"
        };
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RecapError::Storage {
                    source: Box::new(e),
                })?;
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), RecapError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| RecapError::Storage {
                    source: Box::new(e),
                })?;
            conn.busy_timeout(BUSY_TIMEOUT)
                .and_then(|()| conn.execute_batch(journal))
                .map_err(|e| RecapError::Storage {
                    source: Box::new(e),
                })?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| RecapError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| RecapError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The connection every query module calls through.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), RecapError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| RecapError::Storage {
            source: Box::new(e),
        })?;
        debug!("database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_in_wal_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/recap.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (mode, tables) = db
            .connection()
            .call(|conn| -> Result<(String, Vec<String>), rusqlite::Error> {
                let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let tables = stmt
                    .query_map([], |r| r.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok((mode, tables))
            })
            .await
            .unwrap();

        assert_eq!(mode.to_lowercase(), "wal");
        for table in ["requests", "pending_conversations", "jobs", "queue", "events"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recap.db");
        let path = path.to_str().unwrap();

        Database::open(path).await.unwrap().close().await.unwrap();
        let again = Database::open(path).await.unwrap();
        again.close().await.unwrap();
    }
}
