// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker side of the recap orchestrator.
//!
//! A [`WorkerLoop`] claims jobs from the shared work queue and hands each one
//! to the [`JobPipeline`], which extracts the target's history through the
//! data source, cleans and truncates it, asks the summarizer, and persists
//! and publishes the terminal result. Workers never talk to the front-end
//! directly; everything goes through the store.

pub mod cadence;
pub mod clean;
pub mod lease;
pub mod pipeline;
pub mod truncate;
pub mod worker;

pub use pipeline::JobPipeline;
pub use worker::WorkerLoop;
