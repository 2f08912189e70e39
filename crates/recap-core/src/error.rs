// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the recap job orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across all recap adapter traits and core operations.
#[derive(Debug, Error)]
pub enum RecapError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared state store errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The actor's input could not be resolved to an extraction target.
    #[error("invalid target `{input}`: {reason}")]
    TargetInvalid { input: String, reason: String },

    /// A prompt arrived but no live pending conversation exists for the user.
    #[error("no pending request")]
    NoPendingRequest,

    /// The supplied prompt is empty or too long.
    #[error("invalid prompt: {0}")]
    PromptInvalid(String),

    /// No request record exists for the given id.
    #[error("request not found: {0}")]
    RequestNotFound(String),

    /// The data source asked us to back off before the next call.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Network-level failure talking to an external service.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Extraction finished but produced no usable text.
    #[error("no content extracted from target")]
    NoContentExtracted,

    /// History extraction gave up after exhausting its retry budget.
    #[error("extraction failed after {attempts} attempt(s): {message}")]
    ExtractionFailed { attempts: u32, message: String },

    /// Summarization gave up after exhausting its retry budget.
    #[error("summarization failed after {attempts} attempt(s): {message}")]
    SummarizationFailed { attempts: u32, message: String },

    /// The queue redelivered a job more often than allowed.
    #[error("job was delivered {deliveries} times without completing")]
    WorkerCrashed { deliveries: u32 },

    /// Channel adapter errors (connection failure, message format).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable, human-readable classification of a [`RecapError`].
///
/// The string form is what gets persisted as `error_kind` in job error
/// payloads and shown to the actor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ErrorKind {
    ConfigError,
    StoreUnavailable,
    TargetInvalid,
    NoPendingRequest,
    PromptInvalid,
    RequestNotFound,
    RateLimited,
    TransportError,
    HttpError,
    Timeout,
    NoContentExtracted,
    ExtractionFailed,
    SummarizationFailed,
    WorkerCrashed,
    ChannelError,
    Internal,
}

impl RecapError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Storage { .. } => ErrorKind::StoreUnavailable,
            Self::TargetInvalid { .. } => ErrorKind::TargetInvalid,
            Self::NoPendingRequest => ErrorKind::NoPendingRequest,
            Self::PromptInvalid(_) => ErrorKind::PromptInvalid,
            Self::RequestNotFound(_) => ErrorKind::RequestNotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Transport { .. } => ErrorKind::TransportError,
            Self::Http { .. } => ErrorKind::HttpError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NoContentExtracted => ErrorKind::NoContentExtracted,
            Self::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            Self::SummarizationFailed { .. } => ErrorKind::SummarizationFailed,
            Self::WorkerCrashed { .. } => ErrorKind::WorkerCrashed,
            Self::Channel { .. } => ErrorKind::ChannelError,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true for the errors the conversation layer reports back to the
    /// actor and recovers from locally.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Self::TargetInvalid { .. }
                | Self::NoPendingRequest
                | Self::PromptInvalid(_)
                | Self::RequestNotFound(_)
        )
    }

    /// Actor-facing text for this error.
    ///
    /// Store and internal failures fail closed with a generic message so no
    /// backend detail leaks into the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::TargetInvalid { input, reason } => {
                format!("Could not use `{input}` as a target: {reason}. Send a chat link, @username or numeric id.")
            }
            Self::NoPendingRequest => {
                "There is no request waiting for a prompt. Send a target first.".to_string()
            }
            Self::PromptInvalid(reason) => format!("That prompt can't be used: {reason}."),
            Self::RequestNotFound(id) => format!("No request with id `{id}`."),
            _ => "Something went wrong on our side. Please try again later.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_round_trips_through_strings() {
        let err = RecapError::SummarizationFailed {
            attempts: 3,
            message: "connection reset".into(),
        };
        assert_eq!(err.kind().to_string(), "SummarizationFailed");
        assert_eq!(
            ErrorKind::from_str("SummarizationFailed").unwrap(),
            ErrorKind::SummarizationFailed
        );
    }

    #[test]
    fn storage_errors_fail_closed_for_the_actor() {
        let err = RecapError::Storage {
            source: "disk I/O error at /var/lib/recap".into(),
        };
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(!err.user_message().contains("/var/lib"));
        assert!(!err.is_conversational());
    }

    #[test]
    fn conversational_errors_are_recoverable() {
        assert!(RecapError::NoPendingRequest.is_conversational());
        assert!(RecapError::PromptInvalid("too short".into()).is_conversational());
        assert!(
            RecapError::TargetInvalid {
                input: "@nope".into(),
                reason: "not found".into()
            }
            .is_conversational()
        );
        assert!(!RecapError::NoContentExtracted.is_conversational());
    }
}
