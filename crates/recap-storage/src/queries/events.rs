// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event log backing pub/sub across processes.
//!
//! Publishers append rows; subscribers poll for ids above the last one they
//! saw. A subscription starts at the current maximum id, so it only sees
//! events published after it was opened.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, Stream};
use recap_core::RecapError;
use recap_core::types::RawEvent;
use rusqlite::params;

use super::seconds_modifier;
use crate::database::{Database, map_tr_err};

/// Upper bound on rows fetched per poll.
const POLL_BATCH: i64 = 256;

/// Append an event to `channel`.
pub async fn publish(db: &Database, channel: &str, payload: &str) -> Result<i64, RecapError> {
    let channel = channel.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO events (channel, payload) VALUES (?1, ?2)",
                params![channel, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Highest event id written so far, or 0.
pub async fn max_id(db: &Database) -> Result<i64, RecapError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COALESCE(MAX(id), 0) FROM events", [], |r| r.get(0)))
        .await
        .map_err(map_tr_err)
}

/// Events with id greater than `after` on channels starting with `prefix`.
pub async fn fetch_after(
    db: &Database,
    prefix: &str,
    after: i64,
) -> Result<Vec<RawEvent>, RecapError> {
    let prefix = prefix.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel, payload FROM events
                 WHERE id > ?1 AND substr(channel, 1, length(?2)) = ?2
                 ORDER BY id ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![after, prefix, POLL_BATCH], |row| {
                Ok(RawEvent {
                    id: row.get(0)?,
                    channel: row.get(1)?,
                    payload: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete events older than `older_than`. Returns the number removed.
pub async fn prune(db: &Database, older_than: Duration) -> Result<u64, RecapError> {
    let cutoff = seconds_modifier('-', older_than);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM events WHERE created_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![cutoff],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

struct Subscription {
    db: Database,
    prefix: String,
    last_id: i64,
    buffered: VecDeque<RawEvent>,
    poll_interval: Duration,
}

/// Open a live subscription on every channel starting with `prefix`.
///
/// The stream never ends on its own. Poll failures are yielded as errors and
/// polling resumes after the next interval.
pub async fn subscribe(
    db: &Database,
    prefix: &str,
    poll_interval: Duration,
) -> Result<impl Stream<Item = Result<RawEvent, RecapError>> + Send + 'static, RecapError> {
    let start = Subscription {
        db: db.clone(),
        prefix: prefix.to_string(),
        last_id: max_id(db).await?,
        buffered: VecDeque::new(),
        poll_interval,
    };

    Ok(stream::unfold(start, |mut sub| async move {
        loop {
            if let Some(event) = sub.buffered.pop_front() {
                return Some((Ok(event), sub));
            }
            match fetch_after(&sub.db, &sub.prefix, sub.last_id).await {
                Ok(events) if events.is_empty() => tokio::time::sleep(sub.poll_interval).await,
                Ok(events) => {
                    if let Some(last) = events.last() {
                        sub.last_id = last.id;
                    }
                    sub.buffered.extend(events);
                }
                Err(e) => {
                    tokio::time::sleep(sub.poll_interval).await;
                    return Some((Err(e), sub));
                }
            }
        }
    }))
}
