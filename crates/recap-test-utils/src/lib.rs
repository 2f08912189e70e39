// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for recap integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock messaging channel with message injection and capture
//! - [`MockDataSource`] - Scripted targets, history pages, participants and failures
//! - [`MockSummarizer`] - Scripted summarization outcomes with a call log
//! - [`MockDelivery`] - Records every outward delivery
//! - [`TestHarness`] - Front-end and worker wired over a temp database

pub mod harness;
pub mod mock_channel;
pub mod mock_delivery;
pub mod mock_source;
pub mod mock_summarizer;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::MockChannel;
pub use mock_delivery::{DeliveryRecord, MockDelivery};
pub use mock_source::MockDataSource;
pub use mock_summarizer::{MockSummarizer, SummarizeCall};
