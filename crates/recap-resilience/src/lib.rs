// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry and backoff primitives for calls to external services.
//!
//! Errors are first classified as transient, rate-limited or fatal. A
//! [`RetryPolicy`] then decides, per failed attempt, whether to try again and
//! how long to wait: exponential backoff from a base delay, capped, with
//! random jitter. Fatal errors are never retried.

pub mod classify;
pub mod policy;

pub use classify::{Classification, classify};
pub use policy::{Exhausted, RetryDecision, RetryPolicy};
