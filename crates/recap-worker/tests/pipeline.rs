// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pipeline and worker loop against a temp SQLite store.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use recap_config::model::{StorageConfig, WorkerConfig};
use recap_core::types::{
    EVENT_CHANNEL_PREFIX, JobPayload, JobResult, Participant, ProgressEvent, Request,
    RequestStatus, Stage, Target,
};
use recap_core::{EventStream, RecapError, StateStore, WorkQueue};
use recap_ledger::RequestLedger;
use recap_resilience::RetryPolicy;
use recap_storage::{LocalFileStore, SqliteStore};
use recap_test_utils::{MockDataSource, MockSummarizer};
use recap_worker::{JobPipeline, WorkerLoop};

struct Fixture {
    store: Arc<SqliteStore>,
    source: Arc<MockDataSource>,
    summarizer: Arc<MockSummarizer>,
    pipeline: Arc<JobPipeline>,
    payload: JobPayload,
    config: WorkerConfig,
    dir: tempfile::TempDir,
}

async fn fixture(
    source: MockDataSource,
    summarizer: MockSummarizer,
    policy: RetryPolicy,
    config: WorkerConfig,
    multi: bool,
) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(StorageConfig {
        database_path: dir.path().join("worker.db").to_string_lossy().to_string(),
        event_poll_interval_ms: 10,
        ..StorageConfig::default()
    }));
    store.initialize().await.unwrap();

    let ledger = RequestLedger::new(store.clone());
    let mut request = Request::new(
        "7",
        &Target {
            id: "42".into(),
            title: "@channel".into(),
            multi_participant: multi,
        },
    );
    request.prompt = Some("summarize key decisions".into());
    ledger.create(&request).await.unwrap();
    ledger
        .advance(&request.request_id, RequestStatus::Queued, None)
        .await
        .unwrap();

    let payload = JobPayload {
        job_id: format!("extract-{}", request.request_id),
        request_id: request.request_id.clone(),
        user_id: "7".into(),
        target_id: "42".into(),
        target_multi: multi,
        prompt: "summarize key decisions".into(),
        credentials: None,
    };
    store.insert_job(&payload).await.unwrap();

    let source = Arc::new(source);
    let summarizer = Arc::new(summarizer);
    let pipeline = Arc::new(JobPipeline::new(
        store.clone(),
        source.clone(),
        summarizer.clone(),
        Arc::new(LocalFileStore::new(dir.path().join("output"))),
        policy,
        config.clone(),
    ));

    Fixture {
        store,
        source,
        summarizer,
        pipeline,
        payload,
        config,
        dir,
    }
}

fn history_source() -> MockDataSource {
    MockDataSource::new().with_history(
        "42",
        vec![
            vec!["we agreed to ship friday", "  "],
            vec!["qa signs off\u{200B} thursday"],
            vec!["retro on monday"],
        ],
    )
}

async fn status(f: &Fixture) -> Request {
    f.store
        .get_request(&f.payload.request_id)
        .await
        .unwrap()
        .unwrap()
}

/// Read events until a terminal stage arrives.
async fn collect_stages(events: &mut EventStream) -> Vec<ProgressEvent> {
    let mut seen = Vec::new();
    while let Some(next) = events.next().await {
        let event: ProgressEvent = serde_json::from_str(&next.unwrap().payload).unwrap();
        let terminal = event.stage.is_terminal();
        seen.push(event);
        if terminal {
            break;
        }
    }
    seen
}

#[tokio::test]
async fn happy_path_publishes_stages_and_persists_summary() {
    let config = WorkerConfig {
        progress_every_records: 1,
        ..WorkerConfig::default()
    };
    let f = fixture(
        history_source(),
        MockSummarizer::new(),
        RetryPolicy::immediate(3),
        config,
        false,
    )
    .await;
    let mut events = f.store.subscribe(EVENT_CHANNEL_PREFIX).await.unwrap();

    let result = f.pipeline.run(&f.payload).await.unwrap();
    match &result {
        JobResult::Success {
            summary,
            participants_file,
            truncated,
            record_count,
        } => {
            assert_eq!(summary, "summary: summarize key decisions");
            assert!(participants_file.is_none());
            assert!(!truncated);
            assert_eq!(*record_count, 4);
        }
        other => panic!("expected success, got {other:?}"),
    }

    let calls = f.summarizer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].text,
        "we agreed to ship friday\nqa signs off thursday\nretro on monday"
    );

    let job = f.store.get_job(&f.payload.job_id).await.unwrap().unwrap();
    assert_eq!(job.result.as_ref(), Some(&result));
    assert_eq!(status(&f).await.status, RequestStatus::Success);
    assert_eq!(f.source.sessions_opened(), 1);
    assert_eq!(f.source.sessions_closed(), 1);

    let stages: Vec<Stage> = collect_stages(&mut events)
        .await
        .into_iter()
        .map(|e| e.stage)
        .collect();
    assert_eq!(stages.first(), Some(&Stage::Started));
    assert_eq!(stages.get(1), Some(&Stage::ExtractingHistory));
    assert!(stages.contains(&Stage::Progress));
    assert_eq!(&stages[stages.len() - 2..], &[Stage::CallingLlm, Stage::Success]);
}

#[tokio::test]
async fn progress_counts_strictly_increase() {
    let config = WorkerConfig {
        progress_every_records: 1,
        ..WorkerConfig::default()
    };
    let f = fixture(
        history_source(),
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        config,
        false,
    )
    .await;
    let mut events = f.store.subscribe(EVENT_CHANNEL_PREFIX).await.unwrap();

    f.pipeline.run(&f.payload).await.unwrap();

    let counts: Vec<i64> = collect_stages(&mut events)
        .await
        .into_iter()
        .filter(|e| e.stage == Stage::Progress)
        .filter_map(|e| e.progress)
        .collect();
    assert_eq!(counts, vec![2, 3, 4]);
    assert_eq!(status(&f).await.progress, Some(4));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_without_spending_attempts() {
    let source = history_source().with_fetch_errors(vec![RecapError::RateLimited {
        retry_after: Duration::from_secs(30),
    }]);
    // A single attempt: any counted failure would fail the job.
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        WorkerConfig::default(),
        false,
    )
    .await;
    let mut events = f.store.subscribe(EVENT_CHANNEL_PREFIX).await.unwrap();

    let started = tokio::time::Instant::now();
    let result = f.pipeline.run(&f.payload).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(matches!(result, JobResult::Success { .. }));
    assert_eq!(f.source.fetch_calls(), 4);

    let waiting: Vec<_> = collect_stages(&mut events)
        .await
        .into_iter()
        .filter(|e| e.stage == Stage::Waiting)
        .collect();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].detail.as_deref(), Some("30s"));
    assert_eq!(waiting[0].progress, Some(30));
}

#[tokio::test]
async fn transient_fetch_errors_exhaust_into_extraction_failed() {
    let timeout = || RecapError::Timeout {
        duration: Duration::from_secs(30),
    };
    let source = history_source().with_fetch_errors(vec![timeout(), timeout(), timeout()]);
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(3),
        WorkerConfig::default(),
        false,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    match result {
        JobResult::Failure { error_kind, .. } => assert_eq!(error_kind, "ExtractionFailed"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(f.summarizer.call_count().await, 0);
    assert_eq!(f.source.sessions_closed(), 1);
    assert_eq!(status(&f).await.status, RequestStatus::Failed);
}

#[tokio::test]
async fn transient_fetch_error_is_retried_on_the_same_page() {
    let source = history_source().with_fetch_errors(vec![RecapError::Http {
        status: 502,
        message: "bad gateway".into(),
    }]);
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(3),
        WorkerConfig::default(),
        false,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    assert!(matches!(result, JobResult::Success { record_count: 4, .. }));
    assert_eq!(f.source.fetch_calls(), 4);
}

#[tokio::test]
async fn summarization_failures_exhaust_the_retry_budget() {
    let f = fixture(
        history_source(),
        MockSummarizer::failing(3),
        RetryPolicy::immediate(3),
        WorkerConfig::default(),
        false,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    match result {
        JobResult::Failure {
            error_kind,
            message,
        } => {
            assert_eq!(error_kind, "SummarizationFailed");
            assert!(message.contains("3 attempt"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(f.summarizer.call_count().await, 3);
    assert_eq!(f.source.sessions_closed(), 1);
}

#[tokio::test]
async fn fatal_summarizer_error_is_not_retried() {
    let summarizer = MockSummarizer::with_outcomes(vec![Err(RecapError::Http {
        status: 400,
        message: "prompt too long".into(),
    })]);
    let f = fixture(
        history_source(),
        summarizer,
        RetryPolicy::immediate(3),
        WorkerConfig::default(),
        false,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    assert!(matches!(result, JobResult::Failure { .. }));
    assert_eq!(f.summarizer.call_count().await, 1);
}

#[tokio::test]
async fn empty_history_fails_with_no_content() {
    let source = MockDataSource::new().with_history("42", vec![vec!["   ", "\u{200B}"]]);
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(3),
        WorkerConfig::default(),
        false,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    match result {
        JobResult::Failure { error_kind, .. } => assert_eq!(error_kind, "NoContentExtracted"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(f.summarizer.call_count().await, 0);
    assert_eq!(f.source.sessions_closed(), 1);
}

#[tokio::test]
async fn long_history_is_truncated_symmetrically() {
    let long: Vec<String> = (0..500).map(|i| format!("word{i}")).collect();
    let page: Vec<&str> = long.iter().map(String::as_str).collect();
    let source = MockDataSource::new().with_history("42", vec![page]);
    let config = WorkerConfig {
        max_history_tokens: 40,
        ..WorkerConfig::default()
    };
    let f = fixture(source, MockSummarizer::new(), RetryPolicy::immediate(1), config, false).await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    assert!(matches!(result, JobResult::Success { truncated: true, .. }));

    let text = &f.summarizer.calls().await[0].text;
    assert!(text.starts_with("word0 "));
    assert!(text.ends_with(" word499"));
    assert!(text.contains("[TRUNCATED]"));
}

#[tokio::test]
async fn multi_participant_target_writes_participants_file() {
    let source = history_source().with_participants(
        "42",
        vec![
            Participant {
                id: "1".into(),
                first_name: Some("Ada".into()),
                last_name: None,
                username: Some("ada".into()),
            },
            Participant {
                id: "2".into(),
                first_name: Some("Bob".into()),
                last_name: Some("Stone".into()),
                username: None,
            },
        ],
    );
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        WorkerConfig::default(),
        true,
    )
    .await;

    let result = f.pipeline.run(&f.payload).await.unwrap();
    let JobResult::Success {
        participants_file: Some(path),
        ..
    } = result
    else {
        panic!("expected a participants file");
    };

    let path = std::path::PathBuf::from(path);
    assert!(path.starts_with(f.dir.path().join("output")));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with(&format!("participants_{}_", f.payload.job_id)));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "1\tAda @ada\n2\tBob Stone\n"
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limit_while_listing_participants_waits_in_that_phase() {
    let source = history_source()
        .with_participants(
            "42",
            vec![Participant {
                id: "1".into(),
                first_name: Some("Ada".into()),
                last_name: None,
                username: None,
            }],
        )
        .with_participant_errors(vec![RecapError::RateLimited {
            retry_after: Duration::from_secs(10),
        }]);
    let f = fixture(
        source,
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        WorkerConfig::default(),
        true,
    )
    .await;
    let mut events = f.store.subscribe(EVENT_CHANNEL_PREFIX).await.unwrap();

    let started = tokio::time::Instant::now();
    let result = f.pipeline.run(&f.payload).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(matches!(
        result,
        JobResult::Success {
            participants_file: Some(_),
            ..
        }
    ));

    let stages: Vec<Stage> = collect_stages(&mut events)
        .await
        .into_iter()
        .map(|e| e.stage)
        .collect();
    let listing = stages
        .iter()
        .position(|s| *s == Stage::ExtractingParticipants)
        .unwrap();
    assert_eq!(stages[listing + 1], Stage::Waiting);
    assert_eq!(status(&f).await.status, RequestStatus::Success);
}

#[tokio::test]
async fn worker_loop_runs_and_acks_queued_jobs() {
    let f = fixture(
        history_source(),
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        WorkerConfig::default(),
        false,
    )
    .await;
    f.store
        .submit(&f.payload.job_id, &serde_json::to_string(&f.payload).unwrap())
        .await
        .unwrap();
    let worker = WorkerLoop::new(
        "w1",
        f.store.clone(),
        f.store.clone(),
        f.pipeline.clone(),
        f.config.clone(),
    );

    assert!(worker.process_next().await.unwrap());
    assert!(!worker.process_next().await.unwrap());

    let stats = f.store.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    let job = f.store.get_job(&f.payload.job_id).await.unwrap().unwrap();
    assert_eq!(job.attempt_count, 1);
    assert!(matches!(job.result, Some(JobResult::Success { .. })));
}

#[tokio::test]
async fn redelivered_finished_job_is_republished_not_rerun() {
    let f = fixture(
        history_source(),
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        WorkerConfig::default(),
        false,
    )
    .await;
    let result = f.pipeline.run(&f.payload).await.unwrap();
    f.store
        .submit(&f.payload.job_id, &serde_json::to_string(&f.payload).unwrap())
        .await
        .unwrap();
    let mut events = f.store.subscribe(EVENT_CHANNEL_PREFIX).await.unwrap();

    let worker = WorkerLoop::new(
        "w1",
        f.store.clone(),
        f.store.clone(),
        f.pipeline.clone(),
        f.config.clone(),
    );
    assert!(worker.process_next().await.unwrap());

    assert_eq!(f.summarizer.call_count().await, 1);
    assert_eq!(f.source.sessions_opened(), 1);
    let republished = collect_stages(&mut events).await;
    assert_eq!(republished.len(), 1);
    assert_eq!(republished[0].stage, result.stage());
    assert_eq!(f.store.stats().await.unwrap().completed, 1);
}

#[tokio::test]
async fn job_redelivered_too_often_fails_as_crashed() {
    let config = WorkerConfig {
        max_deliveries: 1,
        visibility_timeout_secs: 1,
        ..WorkerConfig::default()
    };
    let f = fixture(
        history_source(),
        MockSummarizer::new(),
        RetryPolicy::immediate(1),
        config,
        false,
    )
    .await;
    f.store
        .submit(&f.payload.job_id, &serde_json::to_string(&f.payload).unwrap())
        .await
        .unwrap();

    // Simulate a worker that died holding the lease.
    let first = f
        .store
        .dequeue(Duration::from_millis(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.deliveries, 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let worker = WorkerLoop::new(
        "w2",
        f.store.clone(),
        f.store.clone(),
        f.pipeline.clone(),
        f.config.clone(),
    );
    assert!(worker.process_next().await.unwrap());

    assert_eq!(f.source.sessions_opened(), 0);
    let job = f.store.get_job(&f.payload.job_id).await.unwrap().unwrap();
    match job.result {
        Some(JobResult::Failure { error_kind, .. }) => assert_eq!(error_kind, "WorkerCrashed"),
        other => panic!("expected crash failure, got {other:?}"),
    }
    assert_eq!(status(&f).await.status, RequestStatus::Failed);
}
