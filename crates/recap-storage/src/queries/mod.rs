// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Every function takes `&Database` and runs one
//! closure on the connection thread.

pub mod events;
pub mod jobs;
pub mod pending;
pub mod queue;
pub mod requests;

use std::time::Duration;

/// Wrap a decoding failure of column `idx` as a rusqlite error.
pub(crate) fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// SQLite date modifier shifting a time by `d`, e.g. `+300.000 seconds`.
pub(crate) fn seconds_modifier(sign: char, d: Duration) -> String {
    format!("{sign}{:.3} seconds", d.as_secs_f64())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::database::Database;

    pub async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }
}
