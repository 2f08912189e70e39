// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replies the conversation layer sends back to the actor.

use std::fmt;

use recap_core::types::Request;

/// Outcome of one conversation turn, rendered as chat text via `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationReply {
    /// A target was resolved and now waits for its prompt.
    TargetAccepted {
        request_id: String,
        target_title: String,
        ttl_secs: u64,
        cancel_token: String,
    },
    Cancelled {
        request_id: String,
    },
    Queued {
        request_id: String,
        job_id: String,
    },
    Status(Box<Request>),
    Help {
        cancel_token: String,
    },
    /// A conversation-layer or fail-closed error message.
    Error(String),
}

impl fmt::Display for ConversationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetAccepted {
                request_id,
                target_title,
                ttl_secs,
                cancel_token,
            } => write!(
                f,
                "Target: {target_title}\nRequest id: {request_id}\n\n\
                 Now send what you want to know about this chat. \
                 You have {} minutes, or send {cancel_token} to abort.",
                ttl_secs.div_ceil(60)
            ),
            Self::Cancelled { request_id } => write!(f, "Request {request_id} cancelled."),
            Self::Queued { request_id, job_id } => write!(
                f,
                "Request {request_id} queued as {job_id}. I'll keep you posted."
            ),
            Self::Status(request) => {
                write!(
                    f,
                    "Request {}\nTarget: {}\nStatus: {}",
                    request.request_id, request.target_title, request.status
                )?;
                if let Some(detail) = &request.detail {
                    write!(f, " ({detail})")?;
                }
                if let Some(progress) = request.progress {
                    write!(f, "\nRecords read: {progress}")?;
                }
                if let Some(job_id) = &request.job_id {
                    write!(f, "\nJob: {job_id}")?;
                }
                write!(f, "\nUpdated: {}", request.updated_at)
            }
            Self::Help { cancel_token } => write!(
                f,
                "Send a chat link, @username or numeric id to summarize it.\n\
                 I'll then ask for your question about it.\n\n\
                 {cancel_token} aborts a request that is waiting for its question.\n\
                 /status [request id] shows where a request is."
            ),
            Self::Error(message) => f.write_str(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_core::RequestStatus;
    use recap_core::types::Target;

    #[test]
    fn target_accepted_mentions_id_and_deadline() {
        let reply = ConversationReply::TargetAccepted {
            request_id: "abcd1234".into(),
            target_title: "Rust Club".into(),
            ttl_secs: 300,
            cancel_token: "/cancel".into(),
        };
        let text = reply.to_string();
        assert!(text.contains("abcd1234"));
        assert!(text.contains("Rust Club"));
        assert!(text.contains("5 minutes"));
        assert!(text.contains("/cancel"));
    }

    #[test]
    fn status_renders_optional_fields() {
        let mut request = Request::new(
            "42",
            &Target {
                id: "42".into(),
                title: "@channel".into(),
                multi_participant: false,
            },
        );
        request.status = RequestStatus::ExtractingHistory;
        request.progress = Some(300);
        let text = ConversationReply::Status(Box::new(request)).to_string();
        assert!(text.contains("EXTRACTING_HISTORY"));
        assert!(text.contains("Records read: 300"));
        assert!(!text.contains("Job:"));
    }
}
