// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the front-end and worker processes.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp layout used for every persisted time value.
///
/// Matches SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so stored values
/// compare correctly as plain strings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Prefix of every pub/sub channel carrying request progress.
pub const EVENT_CHANNEL_PREFIX: &str = "request_status:";

const REQUEST_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const REQUEST_ID_LEN: usize = 8;

/// Current UTC time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// UTC time `after` from now in [`TIMESTAMP_FORMAT`].
pub fn timestamp_after(after: Duration) -> String {
    let delta = chrono::Duration::from_std(after).unwrap_or(chrono::Duration::zero());
    (chrono::Utc::now() + delta)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Generates a fresh request id: 8 random characters from `[a-z0-9]`.
pub fn new_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..REQUEST_ID_LEN)
        .map(|_| REQUEST_ID_ALPHABET[rng.gen_range(0..REQUEST_ID_ALPHABET.len())] as char)
        .collect()
}

/// Unique identifier for a message sent through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Delivery,
    Storage,
    DataSource,
    Summarizer,
}

/// Lifecycle status of a [`Request`].
///
/// The non-terminal variants form a chain ordered by [`rank`](Self::rank).
/// `SUCCESS`, `CANCELLED` and `FAILED` are terminal and absorbing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    PendingPrompt,
    Queued,
    Started,
    ExtractingHistory,
    ExtractingParticipants,
    CallingLlm,
    Success,
    Cancelled,
    Failed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 9] = [
        RequestStatus::PendingPrompt,
        RequestStatus::Queued,
        RequestStatus::Started,
        RequestStatus::ExtractingHistory,
        RequestStatus::ExtractingParticipants,
        RequestStatus::CallingLlm,
        RequestStatus::Success,
        RequestStatus::Cancelled,
        RequestStatus::Failed,
    ];

    /// Position in the status order. Terminal failure states share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::PendingPrompt => 0,
            Self::Queued => 1,
            Self::Started => 2,
            Self::ExtractingHistory => 3,
            Self::ExtractingParticipants => 4,
            Self::CallingLlm => 5,
            Self::Success => 6,
            Self::Cancelled | Self::Failed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Cancelled | Self::Failed)
    }

    /// Statuses in which the worker is reading from the data source, and
    /// may therefore be told to wait.
    pub fn reads_source(self) -> bool {
        matches!(self, Self::ExtractingHistory | Self::ExtractingParticipants)
    }

    /// Whether a record currently in `self` may move to `next`.
    ///
    /// Terminal states never move. Terminal targets are reachable from any
    /// non-terminal state; otherwise `next` must rank strictly higher.
    pub fn can_advance_to(self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.is_terminal() || next.rank() > self.rank()
    }

    /// Every status from which `next` is a legal advance.
    pub fn predecessors_of(next: RequestStatus) -> Vec<RequestStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_advance_to(next))
            .collect()
    }
}

/// A point in the worker pipeline's progress, as carried by [`ProgressEvent`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Started,
    ExtractingHistory,
    Progress,
    Waiting,
    ExtractingParticipants,
    CallingLlm,
    Success,
    Failed,
}

impl Stage {
    /// The request status this stage advances the ledger to.
    ///
    /// `PROGRESS` and `WAITING` are sub-stages of history extraction.
    pub fn status(self) -> RequestStatus {
        match self {
            Self::Started => RequestStatus::Started,
            Self::ExtractingHistory | Self::Progress | Self::Waiting => {
                RequestStatus::ExtractingHistory
            }
            Self::ExtractingParticipants => RequestStatus::ExtractingParticipants,
            Self::CallingLlm => RequestStatus::CallingLlm,
            Self::Success => RequestStatus::Success,
            Self::Failed => RequestStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// An extraction target as resolved by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub title: String,
    /// Groups and channels have a participant list worth exporting.
    #[serde(default)]
    pub multi_participant: bool,
}

/// One user intent to extract and summarize one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub user_id: String,
    pub target_id: String,
    pub target_title: String,
    pub target_multi: bool,
    pub prompt: Option<String>,
    pub status: RequestStatus,
    pub detail: Option<String>,
    pub progress: Option<i64>,
    pub job_id: Option<String>,
    pub delivered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Request {
    /// A fresh request awaiting its prompt.
    pub fn new(user_id: &str, target: &Target) -> Self {
        let now = now_timestamp();
        Self {
            request_id: new_request_id(),
            user_id: user_id.to_string(),
            target_id: target.id.clone(),
            target_title: target.title.clone(),
            target_multi: target.multi_participant,
            prompt: None,
            status: RequestStatus::PendingPrompt,
            detail: None,
            progress: None,
            job_id: None,
            delivered_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Marker that the next message from `user_id` is the prompt for `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConversation {
    pub user_id: String,
    pub request_id: String,
    pub expires_at: String,
}

impl PendingConversation {
    pub fn new(user_id: &str, request_id: &str, ttl: Duration) -> Self {
        Self {
            user_id: user_id.to_string(),
            request_id: request_id.to_string(),
            expires_at: timestamp_after(ttl),
        }
    }
}

/// Work item handed from the dispatcher to a worker through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: String,
    pub request_id: String,
    pub user_id: String,
    pub target_id: String,
    pub target_multi: bool,
    pub prompt: String,
    /// Opaque reference to the data-source credentials to open a session with.
    #[serde(default)]
    pub credentials: Option<String>,
}

/// Terminal outcome of a job, persisted before completion is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    Success {
        summary: String,
        #[serde(default)]
        participants_file: Option<String>,
        #[serde(default)]
        truncated: bool,
        #[serde(default)]
        record_count: u64,
    },
    Failure {
        error_kind: String,
        message: String,
    },
}

impl JobResult {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Success { .. } => Stage::Success,
            Self::Failure { .. } => Stage::Failed,
        }
    }
}

/// Stored job record keyed by `job_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,
    pub request_id: String,
    pub payload: JobPayload,
    pub attempt_count: u32,
    pub result: Option<JobResult>,
    pub created_at: String,
    pub updated_at: String,
}

/// Progress notification published by workers on `request_status:{request_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub request_id: String,
    pub job_id: String,
    pub target_id: String,
    pub stage: Stage,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub progress: Option<i64>,
}

impl ProgressEvent {
    pub fn new(payload: &JobPayload, stage: Stage) -> Self {
        Self {
            request_id: payload.request_id.clone(),
            job_id: payload.job_id.clone(),
            target_id: payload.target_id.clone(),
            stage,
            detail: None,
            progress: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_progress(mut self, progress: i64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Pub/sub channel this event is published on.
    pub fn channel(&self) -> String {
        event_channel(&self.request_id)
    }
}

/// Pub/sub channel name for a request.
pub fn event_channel(request_id: &str) -> String {
    format!("{EVENT_CHANNEL_PREFIX}{request_id}")
}

/// An undecoded message as read from the pub/sub transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub id: i64,
    pub channel: String,
    pub payload: String,
}

/// Status change handed to the outward-delivery interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: RequestStatus,
    pub stage: Stage,
    pub detail: Option<String>,
    pub progress: Option<i64>,
}

/// One message record pulled from the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

/// One page of history as returned by a source session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<Record>,
    /// Cursor for the next page. `None` means the history is exhausted.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A member of a multi-participant target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A claimed work-queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub job_id: String,
    pub payload: String,
    pub status: String,
    pub deliveries: u32,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row counts per queue status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
}

/// An inbound message received from a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub channel: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: String,
    /// Channel-specific routing data as a JSON string (e.g. `{"chat_id": "..."}`).
    pub metadata: Option<String>,
}

/// An outbound message to be sent via a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub recipient_id: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub metadata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings_are_screaming_snake_case() {
        assert_eq!(RequestStatus::CallingLlm.to_string(), "CALLING_LLM");
        assert_eq!(
            RequestStatus::from_str("EXTRACTING_PARTICIPANTS").unwrap(),
            RequestStatus::ExtractingParticipants
        );
        let json = serde_json::to_string(&Stage::Waiting).unwrap();
        assert_eq!(json, "\"WAITING\"");
    }

    #[test]
    fn chain_only_moves_forward() {
        use RequestStatus::*;
        assert!(Queued.can_advance_to(Started));
        assert!(Started.can_advance_to(CallingLlm));
        assert!(!CallingLlm.can_advance_to(ExtractingHistory));
        assert!(!Started.can_advance_to(Started));
        assert!(!Success.can_advance_to(Failed));
    }

    #[test]
    fn terminal_states_reachable_from_any_live_state() {
        for status in RequestStatus::ALL {
            let live = !status.is_terminal();
            assert_eq!(status.can_advance_to(RequestStatus::Failed), live);
            assert_eq!(status.can_advance_to(RequestStatus::Cancelled), live);
        }
    }

    #[test]
    fn predecessors_exclude_terminal_and_later_states() {
        let preds = RequestStatus::predecessors_of(RequestStatus::ExtractingHistory);
        assert_eq!(
            preds,
            vec![
                RequestStatus::PendingPrompt,
                RequestStatus::Queued,
                RequestStatus::Started
            ]
        );
    }

    #[test]
    fn progress_and_waiting_map_to_history_extraction() {
        assert_eq!(Stage::Progress.status(), RequestStatus::ExtractingHistory);
        assert_eq!(Stage::Waiting.status(), RequestStatus::ExtractingHistory);
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Waiting.is_terminal());
    }

    #[test]
    fn request_ids_are_short_and_lowercase() {
        for _ in 0..50 {
            let id = new_request_id();
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let now = now_timestamp();
        let later = timestamp_after(Duration::from_secs(300));
        assert!(later > now);
        assert!(now.ends_with('Z'));
    }

    #[test]
    fn progress_event_wire_format() {
        let payload = JobPayload {
            job_id: "extract-abc".into(),
            request_id: "r1".into(),
            user_id: "u1".into(),
            target_id: "42".into(),
            target_multi: false,
            prompt: "key decisions".into(),
            credentials: None,
        };
        let event = ProgressEvent::new(&payload, Stage::Progress).with_progress(200);
        assert_eq!(event.channel(), "request_status:r1");
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["stage"], "PROGRESS");
        assert_eq!(value["progress"], 200);

        let decoded: ProgressEvent = serde_json::from_str(
            r#"{"request_id":"r1","job_id":"j","target_id":"42","stage":"SUCCESS"}"#,
        )
        .unwrap();
        assert_eq!(decoded.stage, Stage::Success);
        assert!(decoded.detail.is_none());
    }

    #[test]
    fn job_result_is_tagged() {
        let failure = JobResult::Failure {
            error_kind: "NoContentExtracted".into(),
            message: "empty".into(),
        };
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"outcome\":\"failure\""));
        assert_eq!(failure.stage(), Stage::Failed);
    }
}
