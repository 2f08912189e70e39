// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token estimation and symmetric truncation.
//!
//! Long histories are cut in the middle so the summarizer sees both how the
//! conversation started and where it ended up.

/// Inserted where the middle of the text was removed.
pub const TRUNCATION_MARKER: &str = " ... [TRUNCATED] ... ";

/// Estimated tokens for `words` whitespace-separated words: `ceil(words * 4 / 3)`.
pub fn estimate_words(words: usize) -> usize {
    (words * 4).div_ceil(3)
}

/// Estimated token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_words(text.split_whitespace().count())
}

/// Outcome of [`truncate_symmetric`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    pub text: String,
    pub truncated: bool,
}

/// Byte ranges of the whitespace-separated words of `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Keep `text` unchanged if its estimate fits `max_tokens`; otherwise keep
/// the first and last `k` words around [`TRUNCATION_MARKER`], with `k` as
/// large as keeps the whole output within `max_tokens` and at least one.
///
/// The kept windows are sliced from `text`, so record boundaries inside
/// them survive.
pub fn truncate_symmetric(text: &str, max_tokens: usize) -> Truncated {
    if estimate_tokens(text) <= max_tokens {
        return Truncated {
            text: text.to_string(),
            truncated: false,
        };
    }

    let spans = word_spans(text);
    let marker_words = TRUNCATION_MARKER.split_whitespace().count();
    let mut k = (max_tokens * 3 / 8).max(1);
    while k > 1 && estimate_words(2 * k + marker_words) > max_tokens {
        k -= 1;
    }
    // Never let the head and tail overlap.
    let k = k.min(spans.len().saturating_sub(1) / 2).max(1);

    let head = &text[..spans[k - 1].1];
    let tail = &text[spans[spans.len() - k].0..];
    Truncated {
        text: format!("{head}{TRUNCATION_MARKER}{tail}"),
        truncated: true,
    }
}
