// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending conversations: the per-user "awaiting prompt" marker.

use recap_core::RecapError;
use recap_core::types::PendingConversation;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Create or overwrite the pending conversation of a user.
pub async fn put_pending(db: &Database, pending: &PendingConversation) -> Result<(), RecapError> {
    let p = pending.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pending_conversations (user_id, request_id, expires_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     request_id = excluded.request_id,
                     expires_at = excluded.expires_at",
                params![p.user_id, p.request_id, p.expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The user's pending conversation, unless it has expired.
pub async fn get_pending(
    db: &Database,
    user_id: &str,
) -> Result<Option<PendingConversation>, RecapError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, request_id, expires_at FROM pending_conversations
                 WHERE user_id = ?1 AND expires_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![user_id],
                |row| {
                    Ok(PendingConversation {
                        user_id: row.get(0)?,
                        request_id: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete the user's pending conversation if it still refers to `request_id`.
pub async fn delete_pending(
    db: &Database,
    user_id: &str,
    request_id: &str,
) -> Result<bool, RecapError> {
    let user_id = user_id.to_string();
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM pending_conversations WHERE user_id = ?1 AND request_id = ?2",
                params![user_id, request_id],
            )?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every expired pending conversation. Returns the number removed.
pub async fn purge_expired(db: &Database) -> Result<u64, RecapError> {
    db.connection()
        .call(|conn| {
            let removed = conn.execute(
                "DELETE FROM pending_conversations
                 WHERE expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use std::time::Duration;

    #[tokio::test]
    async fn put_overwrites_previous_request() {
        let (db, _dir) = setup_db().await;
        let ttl = Duration::from_secs(300);
        put_pending(&db, &PendingConversation::new("42", "aaaa1111", ttl))
            .await
            .unwrap();
        put_pending(&db, &PendingConversation::new("42", "bbbb2222", ttl))
            .await
            .unwrap();

        let pending = get_pending(&db, "42").await.unwrap().unwrap();
        assert_eq!(pending.request_id, "bbbb2222");
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purgeable() {
        let (db, _dir) = setup_db().await;
        let expired = PendingConversation {
            user_id: "42".into(),
            request_id: "aaaa1111".into(),
            expires_at: "2020-01-01T00:00:00.000Z".into(),
        };
        put_pending(&db, &expired).await.unwrap();

        assert!(get_pending(&db, "42").await.unwrap().is_none());
        assert_eq!(purge_expired(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_requires_matching_request() {
        let (db, _dir) = setup_db().await;
        put_pending(
            &db,
            &PendingConversation::new("42", "bbbb2222", Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert!(!delete_pending(&db, "42", "aaaa1111").await.unwrap());
        assert!(delete_pending(&db, "42", "bbbb2222").await.unwrap());
        assert!(get_pending(&db, "42").await.unwrap().is_none());
    }
}
