// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job records: payload, attempt counter, terminal result.

use recap_core::RecapError;
use recap_core::types::{JobPayload, JobRecord, JobResult};
use rusqlite::{OptionalExtension, params};

use super::conversion_err;
use crate::database::{Database, map_tr_err};

/// Insert a job payload. Returns `false` when the job id already exists.
pub async fn insert_job(db: &Database, payload: &JobPayload) -> Result<bool, RecapError> {
    let json = serde_json::to_string(payload)
        .map_err(|e| RecapError::Internal(format!("failed to encode job payload: {e}")))?;
    let job_id = payload.job_id.clone();
    let request_id = payload.request_id.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO jobs (job_id, request_id, payload) VALUES (?1, ?2, ?3)",
                params![job_id, request_id, json],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a job record by id.
pub async fn get_job(db: &Database, job_id: &str) -> Result<Option<JobRecord>, RecapError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT job_id, request_id, payload, attempt_count, result, created_at, updated_at
                 FROM jobs WHERE job_id = ?1",
                params![job_id],
                |row| {
                    let payload: String = row.get(2)?;
                    let result: Option<String> = row.get(4)?;
                    Ok(JobRecord {
                        job_id: row.get(0)?,
                        request_id: row.get(1)?,
                        payload: serde_json::from_str(&payload)
                            .map_err(|e| conversion_err(2, e))?,
                        attempt_count: row.get(3)?,
                        result: result
                            .map(|r| serde_json::from_str::<JobResult>(&r))
                            .transpose()
                            .map_err(|e| conversion_err(4, e))?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the attempt counter and return the new value.
pub async fn record_attempt(db: &Database, job_id: &str) -> Result<u32, RecapError> {
    let job_id = job_id.to_string();
    let counted = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE jobs SET attempt_count = attempt_count + 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE job_id = ?1
                 RETURNING attempt_count",
                params![job_id],
                |row| row.get::<_, u32>(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    counted.ok_or_else(|| RecapError::Internal("attempt recorded for unknown job".into()))
}

/// Store the terminal result unless one is already stored.
pub async fn set_result(db: &Database, job_id: &str, result: &JobResult) -> Result<bool, RecapError> {
    let json = serde_json::to_string(result)
        .map_err(|e| RecapError::Internal(format!("failed to encode job result: {e}")))?;
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET result = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE job_id = ?1 AND result IS NULL",
                params![job_id, json],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    fn payload() -> JobPayload {
        JobPayload {
            job_id: "extract-0123456789abcdef01234567".into(),
            request_id: "abcd1234".into(),
            user_id: "42".into(),
            target_id: "-100123".into(),
            target_multi: true,
            prompt: "what was decided?".into(),
            credentials: None,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_job_id() {
        let (db, _dir) = setup_db().await;
        assert!(insert_job(&db, &payload()).await.unwrap());
        assert!(!insert_job(&db, &payload()).await.unwrap());

        let job = get_job(&db, &payload().job_id).await.unwrap().unwrap();
        assert_eq!(job.payload, payload());
        assert_eq!(job.attempt_count, 0);
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn attempts_count_up() {
        let (db, _dir) = setup_db().await;
        insert_job(&db, &payload()).await.unwrap();
        assert_eq!(record_attempt(&db, &payload().job_id).await.unwrap(), 1);
        assert_eq!(record_attempt(&db, &payload().job_id).await.unwrap(), 2);
        assert!(record_attempt(&db, "extract-unknown").await.is_err());
    }

    #[tokio::test]
    async fn first_result_wins() {
        let (db, _dir) = setup_db().await;
        insert_job(&db, &payload()).await.unwrap();
        let ok = JobResult::Success {
            summary: "They agreed on Friday.".into(),
            participants_file: None,
            truncated: false,
            record_count: 12,
        };
        let failed = JobResult::Failure {
            error_kind: "WorkerCrashed".into(),
            message: "late".into(),
        };

        assert!(set_result(&db, &payload().job_id, &ok).await.unwrap());
        assert!(!set_result(&db, &payload().job_id, &failed).await.unwrap());

        let job = get_job(&db, &payload().job_id).await.unwrap().unwrap();
        assert_eq!(job.result, Some(ok));
    }
}
