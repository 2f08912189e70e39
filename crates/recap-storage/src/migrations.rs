// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied on
//! every open. Refinery records applied versions in `refinery_schema_history`.

use recap_core::RecapError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations to `conn`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), RecapError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| RecapError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
