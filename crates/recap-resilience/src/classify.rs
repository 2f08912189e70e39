// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transient vs fatal error classification.

use std::time::Duration;

use recap_core::RecapError;

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Worth retrying after a backoff.
    Transient,
    /// The remote side asked us to wait at least this long.
    RateLimited(Duration),
    /// Retrying cannot help.
    Fatal,
}

/// Classify an error returned by a data source or summarizer call.
///
/// Network failures, timeouts, 408, 429 and 5xx responses are transient.
/// Everything else (4xx, invalid input, empty content) is fatal.
pub fn classify(err: &RecapError) -> Classification {
    match err {
        RecapError::RateLimited { retry_after } => Classification::RateLimited(*retry_after),
        RecapError::Transport { .. } | RecapError::Timeout { .. } => Classification::Transient,
        RecapError::Http { status, .. } => match *status {
            408 | 429 => Classification::Transient,
            s if (500..600).contains(&s) => Classification::Transient,
            _ => Classification::Fatal,
        },
        _ => Classification::Fatal,
    }
}
