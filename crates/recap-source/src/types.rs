// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the chat-history export gateway.

use recap_core::types::{Participant, Target};
use serde::{Deserialize, Serialize};

/// Response body of `GET /v1/targets/resolve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveResponse {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub multi_participant: bool,
}

impl ResolveResponse {
    /// Converts to a [`Target`], falling back to the id when the gateway
    /// has no title.
    pub fn into_target(self) -> Target {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());
        Target {
            id: self.id,
            title,
            multi_participant: self.multi_participant,
        }
    }
}

/// Request body of `POST /v1/sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct OpenSessionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<&'a str>,
}

/// Response body of `POST /v1/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: String,
}

/// Response body of `GET /v1/sessions/{id}/participants`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantsResponse {
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// Error envelope the gateway uses for non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorResponse {
    pub error: GatewayErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_title_falls_back_to_id() {
        let resp: ResolveResponse = serde_json::from_str(r#"{"id":"-10042"}"#).unwrap();
        let target = resp.into_target();
        assert_eq!(target.title, "-10042");
        assert!(!target.multi_participant);
    }

    #[test]
    fn credentials_are_omitted_when_absent() {
        let body = serde_json::to_string(&OpenSessionRequest { credentials: None }).unwrap();
        assert_eq!(body, "{}");
    }
}
