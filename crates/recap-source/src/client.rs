// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the chat-history export gateway.
//!
//! Maps gateway responses onto [`RecapError`] so the worker's retry policy
//! can classify them: 429 becomes [`RecapError::RateLimited`], other
//! non-success codes become [`RecapError::Http`], and request timeouts
//! become [`RecapError::Timeout`].

use std::time::Duration;

use recap_core::RecapError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::GatewayErrorResponse;

/// Wait applied when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Thin wrapper around a pooled `reqwest::Client` bound to one gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RecapError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| RecapError::Config(format!("invalid source api key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RecapError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let base_url = Url::parse(base_url)
            .map_err(|e| RecapError::Config(format!("invalid source base_url `{base_url}`: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RecapError::Config(format!(
                "source base_url `{base_url}` cannot carry a path"
            )));
        }

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Builds `{base_url}/{segments...}?{query}` with each segment and
    /// query value percent-encoded.
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.client.delete(url)
    }

    /// Sends the request and returns the response if it was successful.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, RecapError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!(status = %status, url = %response.url(), "gateway response received");
        if status.is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    /// Sends the request and decodes a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RecapError> {
        let response = self.send(request).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| RecapError::Transport {
            message: format!("failed to parse gateway response: {e}"),
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
            message: format!("gateway request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

async fn error_from_response(response: Response) -> RecapError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return RecapError::RateLimited { retry_after };
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<GatewayErrorResponse>(&body) {
        Ok(err) => match err.error.code {
            Some(code) => format!("{code}: {}", err.error.message),
            None => err.error.message,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };
    RecapError::Http {
        status: status.as_u16(),
        message,
    }
}

/// Parses a delta-seconds `Retry-After` value. HTTP dates are not used by
/// the gateway and are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
