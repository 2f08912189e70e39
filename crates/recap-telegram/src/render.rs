// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of job status, results and failures.

use recap_core::types::{Request, Stage, StatusUpdate};

/// Telegram's maximum message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Caption attached to the participants document.
pub const PARTICIPANTS_CAPTION: &str = "📄 Chat participants";

pub fn stage_icon(stage: Stage) -> &'static str {
    match stage {
        Stage::Started => "🔄",
        Stage::ExtractingHistory => "📃",
        Stage::Progress => "📊",
        Stage::Waiting => "⏱️",
        Stage::ExtractingParticipants => "👥",
        Stage::CallingLlm => "🧠",
        Stage::Success => "✅",
        Stage::Failed => "❌",
    }
}

/// `"{icon} Status for {target}: {STAGE}{detail}"`.
pub fn render_status(request: &Request, update: &StatusUpdate) -> String {
    let detail = match (update.stage, update.progress, update.detail.as_deref()) {
        (Stage::Progress, Some(count), _) => format!(" ({count} messages processed)"),
        (Stage::Waiting, _, Some(wait)) => format!(" (rate limit, retrying in {wait})"),
        (Stage::Waiting, _, None) => " (rate limit, please wait)".to_string(),
        (_, _, Some(detail)) => format!(" ({detail})"),
        _ => String::new(),
    };
    format!(
        "{} Status for {}: {}{}",
        stage_icon(update.stage),
        request.target_title,
        update.stage,
        detail
    )
}

pub fn render_failure(request: &Request, error_kind: &str, message: &str) -> String {
    format!(
        "❌ Job failed for {}: {error_kind}: {message}",
        request.target_title
    )
}

/// Splits `text` into messages of at most `max` characters.
///
/// Cuts at the last newline of a window when one exists in its second
/// half, otherwise at the character limit. Never splits a character.
pub fn chunk_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max {
        let window_end = rest
            .char_indices()
            .nth(max)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(nl) if window[..nl].chars().count() >= max / 2 => nl + 1,
            _ => window_end,
        };
        chunks.push(rest[..cut].trim_end_matches('\n').to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_core::RequestStatus;
    use recap_core::types::Target;

    fn request() -> Request {
        Request::new(
            "7",
            &Target {
                id: "-1001".into(),
                title: "Rust Club".into(),
                multi_participant: true,
            },
        )
    }

    fn update(stage: Stage, detail: Option<&str>, progress: Option<i64>) -> StatusUpdate {
        StatusUpdate {
            status: stage.status(),
            stage,
            detail: detail.map(String::from),
            progress,
        }
    }

    #[test]
    fn progress_shows_record_count() {
        let text = render_status(&request(), &update(Stage::Progress, Some("300 records"), Some(300)));
        assert_eq!(text, "📊 Status for Rust Club: PROGRESS (300 messages processed)");
    }

    #[test]
    fn waiting_shows_retry_delay() {
        let text = render_status(&request(), &update(Stage::Waiting, Some("30s"), Some(30)));
        assert_eq!(text, "⏱️ Status for Rust Club: WAITING (rate limit, retrying in 30s)");
    }

    #[test]
    fn plain_stage_has_no_detail() {
        let text = render_status(&request(), &update(Stage::CallingLlm, None, None));
        assert_eq!(text, "🧠 Status for Rust Club: CALLING_LLM");
        assert_eq!(update(Stage::CallingLlm, None, None).status, RequestStatus::CallingLlm);
    }

    #[test]
    fn failure_names_kind_and_message() {
        let text = render_failure(&request(), "SummarizationFailed", "gave up after 3 attempts");
        assert_eq!(
            text,
            "❌ Job failed for Rust Club: SummarizationFailed: gave up after 3 attempts"
        );
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_message("hello", 4096), vec!["hello"]);
        assert_eq!(chunk_message("", 4096), vec![""]);
    }

    #[test]
    fn long_text_is_cut_at_the_limit() {
        let text = "a".repeat(10_000);
        let chunks = chunk_message(&text, MAX_MESSAGE_CHARS);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_boundaries() {
        let text = format!("{}\n{}", "a".repeat(8), "b".repeat(8));
        assert_eq!(chunk_message(&text, 10), vec!["a".repeat(8), "b".repeat(8)]);
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let text = "ж".repeat(25);
        let chunks = chunk_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }
}
