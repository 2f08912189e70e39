// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution of one job attempt.
//!
//! `STARTED -> EXTRACTING_HISTORY -> [EXTRACTING_PARTICIPANTS] -> CALLING_LLM
//! -> SUCCESS | FAILED`. Every stage is advanced on the ledger and published
//! on the request's event channel. The data-source session is closed on every
//! exit path. The terminal result is persisted before it is published.

use std::sync::Arc;

use recap_config::model::WorkerConfig;
use recap_core::types::{JobPayload, JobResult, Participant, ProgressEvent, Stage};
use recap_core::{
    DataSource, ErrorKind, FileStore, RecapError, SourceSession, StateStore, Summarizer,
};
use recap_ledger::RequestLedger;
use recap_resilience::{RetryDecision, RetryPolicy};
use tracing::{debug, error, info, warn};

use crate::cadence::Cadence;
use crate::clean::clean_records;
use crate::truncate::truncate_symmetric;

/// Shared handles one job attempt needs.
pub struct JobPipeline {
    store: Arc<dyn StateStore>,
    ledger: RequestLedger,
    source: Arc<dyn DataSource>,
    summarizer: Arc<dyn Summarizer>,
    files: Arc<dyn FileStore>,
    policy: RetryPolicy,
    config: WorkerConfig,
}

/// What extraction produced.
struct Extracted {
    records: Vec<String>,
    participants_file: Option<String>,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn DataSource>,
        summarizer: Arc<dyn Summarizer>,
        files: Arc<dyn FileStore>,
        policy: RetryPolicy,
        config: WorkerConfig,
    ) -> Self {
        Self {
            ledger: RequestLedger::new(store.clone()),
            store,
            source,
            summarizer,
            files,
            policy,
            config,
        }
    }

    /// Run one attempt of `payload` to a terminal result.
    ///
    /// Job failures become a persisted [`JobResult::Failure`]. Only store
    /// failures are returned as errors: the attempt is then abandoned and
    /// the queue redelivers the job.
    pub async fn run(&self, payload: &JobPayload) -> Result<JobResult, RecapError> {
        info!(
            job_id = %payload.job_id,
            request_id = %payload.request_id,
            target_id = %payload.target_id,
            "job started"
        );
        self.emit(ProgressEvent::new(payload, Stage::Started)).await?;

        let result = match self.attempt(payload).await {
            Ok(result) => result,
            Err(e @ RecapError::Storage { .. }) => return Err(e),
            Err(e) => {
                warn!(job_id = %payload.job_id, error = %e, "job failed");
                JobResult::Failure {
                    error_kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        };

        self.complete(payload, result).await
    }

    /// Persist `result` as the job's terminal result and publish it.
    ///
    /// If a result was already persisted, that one wins and is republished.
    pub async fn complete(
        &self,
        payload: &JobPayload,
        result: JobResult,
    ) -> Result<JobResult, RecapError> {
        let result = if self.store.set_job_result(&payload.job_id, &result).await? {
            result
        } else {
            let existing = self
                .store
                .get_job(&payload.job_id)
                .await?
                .and_then(|job| job.result);
            match existing {
                Some(existing) => {
                    debug!(job_id = %payload.job_id, "terminal result already persisted");
                    existing
                }
                None => {
                    return Err(RecapError::Internal(format!(
                        "job {} has no record to complete",
                        payload.job_id
                    )));
                }
            }
        };

        let mut event = ProgressEvent::new(payload, result.stage());
        if let JobResult::Failure {
            error_kind,
            message,
        } = &result
        {
            event = event.with_detail(format!("{error_kind}: {message}"));
        }
        self.emit(event).await?;

        info!(
            job_id = %payload.job_id,
            request_id = %payload.request_id,
            outcome = %result.stage(),
            "job finished"
        );
        Ok(result)
    }

    async fn attempt(&self, payload: &JobPayload) -> Result<JobResult, RecapError> {
        let mut session = self.open_session(payload).await?;
        let outcome = self.with_session(payload, session.as_mut()).await;
        if let Err(e) = session.close().await {
            warn!(job_id = %payload.job_id, error = %e, "failed to close source session");
        } else {
            debug!(job_id = %payload.job_id, "source session closed");
        }
        outcome
    }

    async fn open_session(
        &self,
        payload: &JobPayload,
    ) -> Result<Box<dyn SourceSession>, RecapError> {
        let mut failures = 0;
        loop {
            match self.source.open_session(payload.credentials.as_deref()).await {
                Ok(session) => return Ok(session),
                Err(e) => self.back_off(payload, e, &mut failures).await?,
            }
        }
    }

    async fn with_session(
        &self,
        payload: &JobPayload,
        session: &mut dyn SourceSession,
    ) -> Result<JobResult, RecapError> {
        let extracted = self.extract(payload, session).await?;
        let record_count = extracted.records.len() as u64;

        let text = clean_records(&extracted.records);
        if text.is_empty() {
            return Err(RecapError::NoContentExtracted);
        }

        let truncated = truncate_symmetric(&text, self.config.max_history_tokens);
        if truncated.truncated {
            info!(
                job_id = %payload.job_id,
                max_tokens = self.config.max_history_tokens,
                "history truncated"
            );
        }

        self.emit(ProgressEvent::new(payload, Stage::CallingLlm)).await?;
        let summary = self
            .policy
            .run("summarize", |_| {
                let summarizer = self.summarizer.clone();
                let prompt = payload.prompt.as_str();
                let text = truncated.text.as_str();
                async move { summarizer.summarize(prompt, text).await }
            })
            .await
            .map_err(|exhausted| RecapError::SummarizationFailed {
                attempts: exhausted.attempts,
                message: exhausted.last_error.to_string(),
            })?;

        Ok(JobResult::Success {
            summary,
            participants_file: extracted.participants_file,
            truncated: truncated.truncated,
            record_count,
        })
    }

    async fn extract(
        &self,
        payload: &JobPayload,
        session: &mut dyn SourceSession,
    ) -> Result<Extracted, RecapError> {
        let records = self.extract_history(payload, session).await?;

        let participants_file = if payload.target_multi {
            self.emit(ProgressEvent::new(payload, Stage::ExtractingParticipants))
                .await?;
            let participants = self.list_participants(payload, session).await?;
            self.write_participants(payload, &participants).await?
        } else {
            None
        };

        Ok(Extracted {
            records,
            participants_file,
        })
    }

    async fn extract_history(
        &self,
        payload: &JobPayload,
        session: &mut dyn SourceSession,
    ) -> Result<Vec<String>, RecapError> {
        self.emit(ProgressEvent::new(payload, Stage::ExtractingHistory))
            .await?;

        let mut cadence = Cadence::new(
            self.config.progress_every_records,
            self.config.progress_interval(),
        );
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut failures = 0;

        loop {
            let page = match session
                .fetch_history_page(&payload.target_id, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.back_off(payload, e, &mut failures).await?;
                    continue;
                }
            };
            failures = 0;

            records.extend(page.records.into_iter().map(|r| r.text));
            let count = records.len() as u64;
            if cadence.due(count) {
                self.emit_progress(payload, count).await?;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let count = records.len() as u64;
        if cadence.flush(count) {
            self.emit_progress(payload, count).await?;
        }
        debug!(job_id = %payload.job_id, records = count, "history extracted");
        Ok(records)
    }

    async fn list_participants(
        &self,
        payload: &JobPayload,
        session: &mut dyn SourceSession,
    ) -> Result<Vec<Participant>, RecapError> {
        let mut failures = 0;
        loop {
            match session.list_participants(&payload.target_id).await {
                Ok(participants) => return Ok(participants),
                Err(e) => self.back_off(payload, e, &mut failures).await?,
            }
        }
    }

    async fn write_participants(
        &self,
        payload: &JobPayload,
        participants: &[Participant],
    ) -> Result<Option<String>, RecapError> {
        if participants.is_empty() {
            return Ok(None);
        }
        let name = format!(
            "participants_{}_{}.txt",
            payload.job_id,
            uuid::Uuid::new_v4().simple()
        );
        let contents = render_participants(participants);
        let path = self.files.write_new(&name, contents.as_bytes()).await?;
        info!(
            job_id = %payload.job_id,
            count = participants.len(),
            path = %path.display(),
            "participants written"
        );
        Ok(Some(path.to_string_lossy().into_owned()))
    }

    /// Handle a failed data-source call.
    ///
    /// Rate limits publish `WAITING`, sleep for the requested time and do not
    /// count as failures. Other errors follow the retry policy; once it gives
    /// up the job fails with `ExtractionFailed`.
    async fn back_off(
        &self,
        payload: &JobPayload,
        err: RecapError,
        failures: &mut u32,
    ) -> Result<(), RecapError> {
        if let RecapError::RateLimited { retry_after } = err {
            let secs = retry_after.as_secs_f64().ceil() as i64;
            warn!(job_id = %payload.job_id, retry_after_secs = secs, "rate limited by source");
            self.emit(
                ProgressEvent::new(payload, Stage::Waiting)
                    .with_detail(format!("{secs}s"))
                    .with_progress(secs),
            )
            .await?;
            tokio::time::sleep(retry_after).await;
            return Ok(());
        }
        if let RecapError::Storage { .. } = err {
            return Err(err);
        }

        *failures += 1;
        match self.policy.decide(&err, *failures) {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    job_id = %payload.job_id,
                    attempt = *failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "source call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            RetryDecision::Fail => Err(RecapError::ExtractionFailed {
                attempts: *failures,
                message: err.to_string(),
            }),
        }
    }

    async fn emit_progress(&self, payload: &JobPayload, count: u64) -> Result<(), RecapError> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.emit(
            ProgressEvent::new(payload, Stage::Progress)
                .with_progress(count)
                .with_detail(format!("{count} records")),
        )
        .await
    }

    /// Advance the ledger and publish `event`.
    ///
    /// Ledger errors other than store failures are logged; the relay applies
    /// the same event again on its side.
    async fn emit(&self, event: ProgressEvent) -> Result<(), RecapError> {
        match self.ledger.apply_event(&event).await {
            Ok(_) => {}
            Err(e @ RecapError::Storage { .. }) => return Err(e),
            Err(e) => warn!(
                request_id = %event.request_id,
                stage = %event.stage,
                error = %e,
                "ledger update failed"
            ),
        }
        self.store.publish(&event).await.inspect_err(|e| {
            error!(request_id = %event.request_id, stage = %event.stage, error = %e, "publish failed")
        })
    }
}

/// One line per participant: `{id}\t{display name} @{username}`.
fn render_participants(participants: &[Participant]) -> String {
    let mut out = String::new();
    for p in participants {
        let name = [p.first_name.as_deref(), p.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&p.id);
        out.push('\t');
        out.push_str(&name);
        if let Some(username) = p.username.as_deref().filter(|u| !u.is_empty()) {
            if !name.is_empty() {
                out.push(' ');
            }
            out.push('@');
            out.push_str(username);
        }
        out.push('\n');
    }
    out
}

/// Failure result for a job the queue redelivered too often.
pub fn crashed_result(deliveries: u32) -> JobResult {
    let err = RecapError::WorkerCrashed { deliveries };
    JobResult::Failure {
        error_kind: ErrorKind::WorkerCrashed.to_string(),
        message: err.to_string(),
    }
}
