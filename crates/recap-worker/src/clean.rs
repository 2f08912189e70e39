// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text cleaning for extracted records.

/// Characters the source embeds for layout that carry no text.
const ZERO_WIDTH: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Clean one record: drop zero-width characters, collapse whitespace runs to
/// a single space and trim.
pub fn clean_record(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text
        .split(|c: char| c.is_whitespace())
        .map(|w| w.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect::<String>())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&word);
    }
    out
}

/// Clean every record and join the non-empty ones with newlines.
pub fn clean_records<I, S>(records: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    records
        .into_iter()
        .map(|r| clean_record(r.as_ref()))
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
