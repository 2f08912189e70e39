// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leased work queue for crash-safe job processing.
//!
//! A dequeued entry is `processing` until its `locked_until` lease runs out;
//! after that it is handed to the next caller again with `deliveries`
//! incremented.

use std::time::Duration;

use recap_core::RecapError;
use recap_core::types::{QueueEntry, QueueStats};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use super::seconds_modifier;
use crate::database::{Database, map_tr_err};

/// Enqueue a job. Returns `false` when the job id was ever enqueued before.
pub async fn submit(db: &Database, job_id: &str, payload: &str) -> Result<bool, RecapError> {
    let job_id = job_id.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO queue (job_id, payload) VALUES (?1, ?2)",
                params![job_id, payload],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest available entry and lease it for `visibility`.
///
/// Available means pending, or processing with an expired lease. The select
/// and the update share an immediate transaction, so two processes never
/// claim the same entry.
pub async fn dequeue(db: &Database, visibility: Duration) -> Result<Option<QueueEntry>, RecapError> {
    let lease = seconds_modifier('+', visibility);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM queue
                     WHERE status = 'pending'
                        OR (status = 'processing'
                            AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                     ORDER BY id ASC
                     LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            let entry = match id {
                Some(id) => Some(tx.query_row(
                    "UPDATE queue SET status = 'processing',
                     deliveries = deliveries + 1,
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1
                     RETURNING id, job_id, payload, status, deliveries, locked_until,
                               created_at, updated_at",
                    params![id, lease],
                    |row| {
                        Ok(QueueEntry {
                            id: row.get(0)?,
                            job_id: row.get(1)?,
                            payload: row.get(2)?,
                            status: row.get(3)?,
                            deliveries: row.get(4)?,
                            locked_until: row.get(5)?,
                            created_at: row.get(6)?,
                            updated_at: row.get(7)?,
                        })
                    },
                )?),
                None => None,
            };
            tx.commit()?;
            Ok(entry)
        })
        .await
        .map_err(map_tr_err)
}

/// Push the lease of a processing entry `visibility` into the future.
pub async fn extend_lease(db: &Database, id: i64, visibility: Duration) -> Result<(), RecapError> {
    let lease = seconds_modifier('+', visibility);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id, lease],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an entry as completed.
pub async fn ack(db: &Database, id: i64) -> Result<(), RecapError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Return a processing entry to the queue immediately.
pub async fn release(db: &Database, id: i64) -> Result<(), RecapError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'pending', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Entry counts per status.
pub async fn stats(db: &Database) -> Result<QueueStats, RecapError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM queue GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut stats = QueueStats::default();
            for row in rows {
                let (status, count) = row?;
                let count = count.max(0) as u64;
                match status.as_str() {
                    "pending" => stats.pending = count,
                    "processing" => stats.processing = count,
                    "completed" => stats.completed = count,
                    _ => {}
                }
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}
