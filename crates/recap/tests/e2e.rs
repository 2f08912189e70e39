// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: conversation turn to delivered outcome.
//!
//! Each test creates an isolated TestHarness with temp SQLite, mock adapters,
//! the event relay and one worker. Tests are independent and order-insensitive.

use std::time::Duration;

use recap_agent::ConversationReply;
use recap_core::types::{JobPayload, Participant, ProgressEvent, RequestStatus, Stage, Target};
use recap_core::{ErrorKind, RecapError, WorkQueue};
use recap_test_utils::{DeliveryRecord, MockDataSource, MockSummarizer, TestHarness};

const WAIT: Duration = Duration::from_secs(5);
const USER: &str = "7";
const PROMPT: &str = "what did we decide about the release?";

fn club() -> Target {
    Target {
        id: "-1001".into(),
        title: "Rust Club".into(),
        multi_participant: false,
    }
}

fn source() -> MockDataSource {
    MockDataSource::new()
        .with_target("@rustclub", club())
        .with_history(
            "-1001",
            vec![vec!["ship 1.2 on friday", "agreed"], vec!["who owns the release?"]],
        )
}

/// Run target and prompt turns, returning the request id.
async fn submit(harness: &TestHarness) -> String {
    let reply = harness.send(USER, "@rustclub").await;
    let ConversationReply::TargetAccepted { request_id, .. } = reply else {
        panic!("expected target to be accepted, got {reply:?}");
    };
    let reply = harness.send(USER, PROMPT).await;
    assert!(
        matches!(reply, ConversationReply::Queued { request_id: ref queued, .. } if *queued == request_id),
        "expected queued reply, got {reply:?}"
    );
    request_id
}

// ---- Happy path ----

#[tokio::test]
async fn target_and_prompt_are_summarized_and_delivered() {
    let mut harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    assert_eq!(
        harness.ledger.get(&request_id).await.unwrap().status,
        RequestStatus::Queued
    );

    assert!(harness.run_worker_once().await.unwrap());
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();
    let request = harness
        .wait_for_status(&request_id, RequestStatus::Success, WAIT)
        .await
        .unwrap();
    assert!(request.job_id.is_some());

    let terminal = harness.delivery.terminal_records().await;
    assert_eq!(terminal.len(), 1);
    let DeliveryRecord::Result {
        request_id: delivered_id,
        user_id,
        summary,
        participants_file,
    } = &terminal[0]
    else {
        panic!("expected a result delivery, got {:?}", terminal[0]);
    };
    assert_eq!(delivered_id, &request_id);
    assert_eq!(user_id, USER);
    assert_eq!(summary, &format!("summary: {PROMPT}"));
    assert!(participants_file.is_none());

    let calls = harness.summarizer.calls().await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].text.contains("ship 1.2 on friday"));
    assert!(calls[0].text.contains("who owns the release?"));
    assert_eq!(harness.source.sessions_opened(), harness.source.sessions_closed());
}

#[tokio::test]
async fn nothing_is_delivered_after_the_result() {
    let mut harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();
    // Let the relay drain whatever progress events are still queued behind it.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let records = harness.delivery.records().await;
    assert!(matches!(records.last(), Some(DeliveryRecord::Result { .. })));
    for record in &records {
        if let DeliveryRecord::Progress { request_id: id, update, .. } = record {
            assert_eq!(id, &request_id);
            assert!(!update.status.is_terminal(), "terminal status sent as progress: {update:?}");
        }
    }
}

#[tokio::test]
async fn group_target_delivers_a_participants_file() {
    let group = Target {
        multi_participant: true,
        ..club()
    };
    let source = source().with_target("@rustclub", group).with_participants(
        "-1001",
        vec![
            Participant {
                id: "1".into(),
                first_name: Some("Ferris".into()),
                last_name: None,
                username: Some("ferris".into()),
            },
            Participant {
                id: "2".into(),
                first_name: Some("Corro".into()),
                last_name: None,
                username: None,
            },
        ],
    );
    let mut harness = TestHarness::builder()
        .with_source(source)
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();

    let terminal = harness.delivery.terminal_records().await;
    let DeliveryRecord::Result {
        participants_file: Some(path),
        ..
    } = &terminal[0]
    else {
        panic!("expected a participants file, got {:?}", terminal[0]);
    };
    assert!(path.starts_with(&harness.output_dir));
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains("ferris"));
    assert!(contents.contains("Corro"));
}

// ---- Conversation ----

#[tokio::test]
async fn cancelled_request_never_reaches_the_queue() {
    let harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();

    let ConversationReply::TargetAccepted { request_id, .. } =
        harness.send(USER, "@rustclub").await
    else {
        panic!("expected target to be accepted");
    };
    let reply = harness.send(USER, "/cancel").await;
    assert_eq!(
        reply,
        ConversationReply::Cancelled {
            request_id: request_id.clone()
        }
    );

    let request = harness.ledger.get(&request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Cancelled);
    assert!(request.job_id.is_none());
    assert!(!harness.run_worker_once().await.unwrap());

    // With nothing pending, a prompt-shaped message is treated as a target.
    let reply = harness.send(USER, PROMPT).await;
    assert!(matches!(reply, ConversationReply::Error(_)));
}

#[tokio::test]
async fn status_command_reports_the_latest_request() {
    let harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    let request_id = submit(&harness).await;

    let ConversationReply::Status(request) = harness.send(USER, "/status").await else {
        panic!("expected a status reply");
    };
    assert_eq!(request.request_id, request_id);
    assert_eq!(request.status, RequestStatus::Queued);

    let reply = harness.send("8", &format!("/status {request_id}")).await;
    assert!(
        matches!(reply, ConversationReply::Error(_)),
        "another user's request must not be visible, got {reply:?}"
    );
}

// ---- Failures and retries ----

#[tokio::test]
async fn rate_limited_extraction_waits_and_then_succeeds() {
    let source = source().with_fetch_errors(vec![RecapError::RateLimited {
        retry_after: Duration::from_millis(50),
    }]);
    let mut harness = TestHarness::builder()
        .with_source(source)
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness
        .wait_for_status(&request_id, RequestStatus::Success, WAIT)
        .await
        .unwrap();

    // The rate limit is waited out, not counted as a failed attempt.
    assert_eq!(harness.summarizer.call_count().await, 1);
    assert!(harness.source.fetch_calls() >= 3);
}

#[tokio::test]
async fn exhausted_summarization_is_delivered_as_one_failure() {
    let mut harness = TestHarness::builder()
        .with_source(source())
        .with_summarizer(MockSummarizer::failing(3))
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();
    harness
        .wait_for_status(&request_id, RequestStatus::Failed, WAIT)
        .await
        .unwrap();

    assert_eq!(harness.summarizer.call_count().await, 3);
    let terminal = harness.delivery.terminal_records().await;
    assert_eq!(terminal.len(), 1);
    let DeliveryRecord::Failure { error_kind, .. } = &terminal[0] else {
        panic!("expected a failure delivery, got {:?}", terminal[0]);
    };
    assert_eq!(error_kind, &ErrorKind::SummarizationFailed.to_string());
}

#[tokio::test]
async fn empty_chat_fails_without_calling_the_summarizer() {
    let source = MockDataSource::new().with_target("@rustclub", club());
    let mut harness = TestHarness::builder()
        .with_source(source)
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness
        .wait_for_status(&request_id, RequestStatus::Failed, WAIT)
        .await
        .unwrap();
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();

    assert_eq!(harness.summarizer.call_count().await, 0);
    let terminal = harness.delivery.terminal_records().await;
    assert!(matches!(
        &terminal[0],
        DeliveryRecord::Failure { error_kind, .. } if *error_kind == ErrorKind::NoContentExtracted.to_string()
    ));
}

// ---- Idempotence ----

#[tokio::test]
async fn enqueueing_the_same_request_twice_creates_one_job() {
    let harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    let request_id = submit(&harness).await;
    let request = harness.ledger.get(&request_id).await.unwrap();

    let again = harness.dispatcher.enqueue(&request).await.unwrap();
    assert_eq!(Some(again.as_str()), request.job_id.as_deref());
    assert_eq!(harness.store.stats().await.unwrap().pending, 1);

    assert!(harness.run_worker_once().await.unwrap());
    assert!(!harness.run_worker_once().await.unwrap());
}

#[tokio::test]
async fn replayed_terminal_event_is_delivered_once() {
    let mut harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.run_worker_once().await.unwrap();
    harness.wait_for_terminal_deliveries(1, WAIT).await.unwrap();

    let request = harness.ledger.get(&request_id).await.unwrap();
    let payload = JobPayload {
        job_id: request.job_id.clone().unwrap(),
        request_id: request_id.clone(),
        user_id: USER.into(),
        target_id: request.target_id.clone(),
        target_multi: false,
        prompt: PROMPT.into(),
        credentials: None,
    };
    harness
        .relay
        .apply(&ProgressEvent::new(&payload, Stage::Success))
        .await
        .unwrap();
    // A late failure for a finished request changes nothing either.
    harness
        .relay
        .apply(&ProgressEvent::new(&payload, Stage::Failed).with_detail("late"))
        .await
        .unwrap();

    assert_eq!(harness.delivery.terminal_records().await.len(), 1);
    assert_eq!(
        harness.ledger.get(&request_id).await.unwrap().status,
        RequestStatus::Success
    );
}

#[tokio::test]
async fn failed_terminal_delivery_is_retried_on_replay() {
    let mut harness = TestHarness::builder()
        .with_source(source())
        .build()
        .await
        .unwrap();
    harness.start_relay().await;

    let request_id = submit(&harness).await;
    harness.delivery.fail_next(1).await;
    harness.run_worker_once().await.unwrap();
    harness
        .wait_for_status(&request_id, RequestStatus::Success, WAIT)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Progress updates may have absorbed the injected failure; only replay
    // when the result itself was lost.
    if harness.delivery.terminal_records().await.is_empty() {
        let request = harness.ledger.get(&request_id).await.unwrap();
        let payload = JobPayload {
            job_id: request.job_id.clone().unwrap(),
            request_id: request_id.clone(),
            user_id: USER.into(),
            target_id: request.target_id.clone(),
            target_multi: false,
            prompt: PROMPT.into(),
            credentials: None,
        };
        harness
            .relay
            .apply(&ProgressEvent::new(&payload, Stage::Success))
            .await
            .unwrap();
    }

    assert_eq!(harness.delivery.terminal_records().await.len(), 1);
}
