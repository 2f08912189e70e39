// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Provides [`AnthropicClient`] which handles request construction,
//! authentication and error mapping. Retries are left to the caller's
//! retry policy, so every call makes exactly one HTTP request.

use std::time::Duration;

use recap_core::RecapError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    default_model: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicClient {
    /// Creates a new Anthropic API client.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key for authentication
    /// * `api_version` - API version string (e.g., "2023-06-01")
    /// * `model` - Default model identifier
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_key: String,
        api_version: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, RecapError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| RecapError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&api_version).map_err(|e| {
                RecapError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RecapError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            default_model: model,
            base_url: API_BASE_URL.to_string(),
            timeout,
        })
    }

    /// Returns the default model identifier.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a non-streaming request and returns the full response.
    ///
    /// Non-success statuses become [`RecapError::Http`] carrying the API's
    /// error type and message; network failures become
    /// [`RecapError::Transport`] or [`RecapError::Timeout`].
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, RecapError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("{}: {}", api_err.error.type_, api_err.error.message),
                Err(_) => body,
            };
            return Err(RecapError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| RecapError::Transport {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> RecapError {
        if e.is_timeout() {
            return RecapError::Timeout {
                duration: self.timeout,
            };
        }
        RecapError::Transport {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}
