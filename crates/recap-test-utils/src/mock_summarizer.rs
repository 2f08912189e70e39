// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock summarizer with scripted outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use recap_core::RecapError;
use recap_core::traits::adapter::PluginAdapter;
use recap_core::traits::summarizer::Summarizer;
use recap_core::types::{AdapterType, HealthStatus};

/// One recorded `summarize` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeCall {
    pub prompt: String,
    pub text: String,
}

/// A summarizer that pops scripted outcomes from a FIFO queue.
///
/// When the queue is empty it answers `"summary: {prompt}"`.
pub struct MockSummarizer {
    outcomes: Arc<Mutex<VecDeque<Result<String, RecapError>>>>,
    calls: Arc<Mutex<Vec<SummarizeCall>>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock pre-loaded with the given outcomes.
    pub fn with_outcomes(outcomes: Vec<Result<String, RecapError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every one of the next `n` calls with a transport error.
    pub fn failing(n: usize) -> Self {
        Self::with_outcomes(
            (0..n)
                .map(|i| {
                    Err(RecapError::Transport {
                        message: format!("connection reset ({})", i + 1),
                        source: None,
                    })
                })
                .collect(),
        )
    }

    pub async fn push_outcome(&self, outcome: Result<String, RecapError>) {
        self.outcomes.lock().await.push_back(outcome);
    }

    pub async fn calls(&self) -> Vec<SummarizeCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSummarizer {
    fn name(&self) -> &str {
        "mock-summarizer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Summarizer
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        Ok(())
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String, RecapError> {
        self.calls.lock().await.push(SummarizeCall {
            prompt: prompt.to_string(),
            text: text.to_string(),
        });
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(format!("summary: {prompt}")))
    }
}
