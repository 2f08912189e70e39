// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude summarizer for the recap job orchestrator.
//!
//! This crate implements [`Summarizer`] on top of the non-streaming
//! Anthropic Messages API.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use recap_config::model::AnthropicConfig;
use recap_core::error::RecapError;
use recap_core::traits::{PluginAdapter, Summarizer};
use recap_core::types::{AdapterType, HealthStatus};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Instructions used when `anthropic.system_prompt` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You summarize chat histories. Answer the user's request \
using only the supplied history. Be concise and keep names, dates and decisions exact. If the \
history does not contain the answer, say so.";

/// Anthropic Claude summarizer implementing [`Summarizer`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicSummarizer {
    client: AnthropicClient,
    system_prompt: String,
    max_tokens: u32,
}

impl AnthropicSummarizer {
    /// Creates a new summarizer from the `[anthropic]` configuration.
    pub fn new(config: &AnthropicConfig) -> Result<Self, RecapError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = AnthropicClient::new(
            api_key,
            config.api_version.clone(),
            config.default_model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(model = config.default_model, "Anthropic summarizer initialized");

        Ok(Self::with_client(
            client,
            resolve_system_prompt(&config.system_prompt),
            config.max_tokens,
        ))
    }

    /// Creates a summarizer with an existing client.
    pub fn with_client(client: AnthropicClient, system_prompt: String, max_tokens: u32) -> Self {
        Self {
            client,
            system_prompt,
            max_tokens,
        }
    }

    fn to_message_request(&self, prompt: &str, text: &str) -> MessageRequest {
        MessageRequest {
            model: self.client.default_model().to_string(),
            messages: vec![ApiMessage::user(render_user_message(prompt, text))],
            system: Some(self.system_prompt.clone()),
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicSummarizer {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Summarizer
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        // A real probe would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        debug!("Anthropic summarizer shutting down");
        Ok(())
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String, RecapError> {
        let request = self.to_message_request(prompt, text);
        let response = self.client.complete_message(&request).await?;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "summary generated"
        );

        let summary = response.text();
        if summary.trim().is_empty() {
            return Err(RecapError::Internal(format!(
                "model returned an empty summary (stop_reason: {})",
                response.stop_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(summary)
    }
}

/// Lays out the actor's request and the history as one user turn.
fn render_user_message(prompt: &str, text: &str) -> String {
    format!("{prompt}\n\n<history>\n{text}\n</history>")
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, RecapError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(RecapError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )),
    }
}

fn resolve_system_prompt(configured: &Option<String>) -> String {
    match configured {
        Some(prompt) if !prompt.trim().is_empty() => prompt.trim().to_string(),
        _ => DEFAULT_SYSTEM_PROMPT.to_string(),
    }
}
