// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request records and their conditional updates.

use std::str::FromStr;

use recap_core::RecapError;
use recap_core::types::{Request, RequestStatus};
use rusqlite::{OptionalExtension, params};

use super::conversion_err;
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "request_id, user_id, target_id, target_title, target_multi, prompt, \
                       status, detail, progress, job_id, delivered_at, created_at, updated_at";

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<Request> {
    let status: String = row.get(6)?;
    Ok(Request {
        request_id: row.get(0)?,
        user_id: row.get(1)?,
        target_id: row.get(2)?,
        target_title: row.get(3)?,
        target_multi: row.get(4)?,
        prompt: row.get(5)?,
        status: RequestStatus::from_str(&status).map_err(|e| conversion_err(6, e))?,
        detail: row.get(7)?,
        progress: row.get(8)?,
        job_id: row.get(9)?,
        delivered_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Insert a new request record.
pub async fn insert_request(db: &Database, request: &Request) -> Result<(), RecapError> {
    let r = request.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO requests ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    r.request_id,
                    r.user_id,
                    r.target_id,
                    r.target_title,
                    r.target_multi,
                    r.prompt,
                    r.status.to_string(),
                    r.detail,
                    r.progress,
                    r.job_id,
                    r.delivered_at,
                    r.created_at,
                    r.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a request by id.
pub async fn get_request(db: &Database, request_id: &str) -> Result<Option<Request>, RecapError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM requests WHERE request_id = ?1"),
                params![request_id],
                row_to_request,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The most recently created request of a user.
pub async fn latest_for_user(db: &Database, user_id: &str) -> Result<Option<Request>, RecapError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM requests WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![user_id],
                row_to_request,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set the prompt of a request still waiting for one.
pub async fn attach_prompt(
    db: &Database,
    request_id: &str,
    prompt: &str,
) -> Result<bool, RecapError> {
    let request_id = request_id.to_string();
    let prompt = prompt.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE requests SET prompt = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1 AND status = 'PENDING_PROMPT' AND prompt IS NULL",
                params![request_id, prompt],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Attach `job_id` unless a different job is already attached.
pub async fn attach_job(db: &Database, request_id: &str, job_id: &str) -> Result<bool, RecapError> {
    let request_id = request_id.to_string();
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE requests SET job_id = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1 AND (job_id IS NULL OR job_id = ?2)",
                params![request_id, job_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a request to `to` if its current status is one of `from`.
///
/// The check and the write are one statement, so concurrent writers in other
/// processes cannot interleave between them.
pub async fn transition_status(
    db: &Database,
    request_id: &str,
    from: &[RequestStatus],
    to: RequestStatus,
    detail: Option<&str>,
) -> Result<bool, RecapError> {
    if from.is_empty() {
        return Ok(false);
    }
    let request_id = request_id.to_string();
    let from: Vec<String> = from.iter().map(ToString::to_string).collect();
    let from = serde_json::to_string(&from)
        .map_err(|e| RecapError::Internal(format!("failed to encode status set: {e}")))?;
    let to = to.to_string();
    let detail = detail.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE requests SET status = ?2, detail = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1
                   AND status IN (SELECT value FROM json_each(?4))",
                params![request_id, to, detail, from],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a larger progress count on a non-terminal request.
pub async fn record_progress(
    db: &Database,
    request_id: &str,
    progress: i64,
    detail: Option<&str>,
) -> Result<bool, RecapError> {
    let request_id = request_id.to_string();
    let detail = detail.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE requests SET progress = ?2, detail = COALESCE(?3, detail),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1
                   AND status NOT IN ('SUCCESS', 'CANCELLED', 'FAILED')
                   AND (progress IS NULL OR progress < ?2)",
                params![request_id, progress, detail],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Set the delivered marker if it is unset.
pub async fn claim_delivery(db: &Database, request_id: &str) -> Result<bool, RecapError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE requests SET delivered_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1 AND delivered_at IS NULL",
                params![request_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Clear the delivered marker.
pub async fn release_delivery(db: &Database, request_id: &str) -> Result<(), RecapError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE requests SET delivered_at = NULL WHERE request_id = ?1",
                params![request_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use recap_core::types::Target;

    fn sample(user: &str) -> Request {
        Request::new(
            user,
            &Target {
                id: "-100123".into(),
                title: "Rust Club".into(),
                multi_participant: true,
            },
        )
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        insert_request(&db, &request).await.unwrap();

        let loaded = get_request(&db, &request.request_id).await.unwrap().unwrap();
        assert_eq!(loaded, request);
        assert!(get_request(&db, "missing1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prompt_attaches_once() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        insert_request(&db, &request).await.unwrap();

        assert!(attach_prompt(&db, &request.request_id, "summarize").await.unwrap());
        assert!(!attach_prompt(&db, &request.request_id, "again").await.unwrap());
        let loaded = get_request(&db, &request.request_id).await.unwrap().unwrap();
        assert_eq!(loaded.prompt.as_deref(), Some("summarize"));
    }

    #[tokio::test]
    async fn job_attaches_idempotently() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        insert_request(&db, &request).await.unwrap();

        assert!(attach_job(&db, &request.request_id, "extract-a").await.unwrap());
        assert!(attach_job(&db, &request.request_id, "extract-a").await.unwrap());
        assert!(!attach_job(&db, &request.request_id, "extract-b").await.unwrap());
    }

    #[tokio::test]
    async fn transitions_only_from_listed_states() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        let id = request.request_id.clone();
        insert_request(&db, &request).await.unwrap();

        let moved = transition_status(
            &db,
            &id,
            &[RequestStatus::Started],
            RequestStatus::ExtractingHistory,
            None,
        )
        .await
        .unwrap();
        assert!(!moved, "PENDING_PROMPT is not in the from-set");

        let moved = transition_status(
            &db,
            &id,
            &RequestStatus::predecessors_of(RequestStatus::Queued),
            RequestStatus::Queued,
            Some("queued"),
        )
        .await
        .unwrap();
        assert!(moved);

        let loaded = get_request(&db, &id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Queued);
        assert_eq!(loaded.detail.as_deref(), Some("queued"));

        assert!(!transition_status(&db, &id, &[], RequestStatus::Failed, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn progress_only_grows_and_stops_at_terminal() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        let id = request.request_id.clone();
        insert_request(&db, &request).await.unwrap();

        assert!(record_progress(&db, &id, 200, Some("200 messages")).await.unwrap());
        assert!(!record_progress(&db, &id, 100, None).await.unwrap());
        assert!(!record_progress(&db, &id, 200, None).await.unwrap());

        transition_status(
            &db,
            &id,
            &RequestStatus::predecessors_of(RequestStatus::Cancelled),
            RequestStatus::Cancelled,
            None,
        )
        .await
        .unwrap();
        assert!(!record_progress(&db, &id, 500, None).await.unwrap());

        let loaded = get_request(&db, &id).await.unwrap().unwrap();
        assert_eq!(loaded.progress, Some(200));
    }

    #[tokio::test]
    async fn delivery_claim_is_exclusive_until_released() {
        let (db, _dir) = setup_db().await;
        let request = sample("42");
        let id = request.request_id.clone();
        insert_request(&db, &request).await.unwrap();

        assert!(claim_delivery(&db, &id).await.unwrap());
        assert!(!claim_delivery(&db, &id).await.unwrap());
        release_delivery(&db, &id).await.unwrap();
        assert!(claim_delivery(&db, &id).await.unwrap());
    }

    #[tokio::test]
    async fn latest_request_wins() {
        let (db, _dir) = setup_db().await;
        let mut older = sample("7");
        older.created_at = "2026-01-01T00:00:00.000Z".into();
        let newer = sample("7");
        insert_request(&db, &older).await.unwrap();
        insert_request(&db, &newer).await.unwrap();
        insert_request(&db, &sample("8")).await.unwrap();

        let latest = latest_for_user(&db, "7").await.unwrap().unwrap();
        assert_eq!(latest.request_id, newer.request_id);
        assert!(latest_for_user(&db, "9").await.unwrap().is_none());
    }
}
