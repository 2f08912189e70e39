// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of the actor's raw target input.

const LINK_HOSTS: [&str; 3] = ["t.me/", "telegram.me/", "telegram.dog/"];

/// Reduces a chat link, `@username` or numeric id to the query the gateway
/// resolves. Returns `None` for input that cannot name a target.
///
/// Private invite links (`t.me/+hash`, `t.me/joinchat/hash`) are passed
/// through with their path intact.
pub fn normalize_target(raw: &str) -> Option<String> {
    let mut input = raw.trim();
    if input.is_empty() || input.chars().any(char::is_whitespace) {
        return None;
    }

    for scheme in ["https://", "http://"] {
        if let Some(rest) = input.strip_prefix(scheme) {
            input = rest;
        }
    }
    let input = input.strip_prefix("www.").unwrap_or(input);

    if let Some(path) = LINK_HOSTS.iter().find_map(|host| input.strip_prefix(host)) {
        let path = path.trim_end_matches('/');
        if path.starts_with('+') || path.starts_with("joinchat/") {
            return Some(path.to_string());
        }
        // Message links (`t.me/name/123`) name the chat in their first segment.
        let name = path.split('/').next().unwrap_or_default();
        return valid_username(name).then(|| name.to_string());
    }

    if is_numeric_id(input) {
        return Some(input.to_string());
    }

    let name = input.strip_prefix('@').unwrap_or(input);
    valid_username(name).then(|| name.to_string())
}

fn is_numeric_id(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
