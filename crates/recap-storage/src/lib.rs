// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the recap job orchestrator.
//!
//! One WAL-mode database file is shared by the front-end and every worker
//! process. It holds requests, pending conversations, job records, the leased
//! work queue, and an append-only event log that backs pub/sub. Each process
//! serializes its own statements through a single `tokio-rusqlite` connection;
//! cross-process safety comes from single-statement conditional writes.

pub mod adapter;
pub mod database;
pub mod files;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
pub use files::{LocalFileStore, cleanup_old_files};
