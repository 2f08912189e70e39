// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of job progress and outcomes to the actor's DM.
//!
//! Each request gets one status message that is edited in place as the job
//! advances. Results are sent as fresh messages, split at Telegram's length
//! limit, followed by the participants document when there is one.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use recap_core::error::RecapError;
use recap_core::traits::{DeliveryAdapter, PluginAdapter};
use recap_core::types::{AdapterType, HealthStatus, Request, StatusUpdate};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::render::{
    MAX_MESSAGE_CHARS, PARTICIPANTS_CAPTION, chunk_message, render_failure, render_status,
};

/// [`DeliveryAdapter`] that talks to the actor through the bot's DM.
pub struct TelegramDelivery {
    bot: Bot,
    /// Status message per request id, edited on each progress update.
    status_messages: Mutex<HashMap<String, MessageId>>,
}

impl TelegramDelivery {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            status_messages: Mutex::new(HashMap::new()),
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, RecapError> {
        let sent = self
            .bot
            .send_message(chat, text)
            .await
            .map_err(|e| channel_error("failed to send message", e))?;
        Ok(sent.id)
    }

    async fn forget_status(&self, request_id: &str) {
        self.status_messages.lock().await.remove(request_id);
    }
}

#[async_trait]
impl PluginAdapter for TelegramDelivery {
    fn name(&self) -> &str {
        "telegram-delivery"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Delivery
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        debug!("Telegram delivery shutting down");
        Ok(())
    }
}

#[async_trait]
impl DeliveryAdapter for TelegramDelivery {
    async fn deliver_progress(
        &self,
        request: &Request,
        update: &StatusUpdate,
    ) -> Result<(), RecapError> {
        let chat = user_chat(&request.user_id)?;
        let text = render_status(request, update);

        let existing = self
            .status_messages
            .lock()
            .await
            .get(&request.request_id)
            .copied();
        if let Some(message_id) = existing {
            match self.bot.edit_message_text(chat, message_id, &text).await {
                Ok(_) => return Ok(()),
                Err(e) if is_not_modified(&e) => return Ok(()),
                Err(e) => {
                    warn!(
                        request_id = %request.request_id,
                        error = %e,
                        "status edit failed, sending a new status message"
                    );
                }
            }
        }

        let message_id = self.send_text(chat, &text).await?;
        self.status_messages
            .lock()
            .await
            .insert(request.request_id.clone(), message_id);
        Ok(())
    }

    async fn deliver_result(
        &self,
        request: &Request,
        summary: &str,
        participants_file: Option<&Path>,
    ) -> Result<(), RecapError> {
        let chat = user_chat(&request.user_id)?;
        for chunk in chunk_message(summary, MAX_MESSAGE_CHARS) {
            self.send_text(chat, &chunk).await?;
        }

        if let Some(path) = participants_file {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                self.bot
                    .send_document(chat, InputFile::file(path))
                    .caption(PARTICIPANTS_CAPTION)
                    .await
                    .map_err(|e| channel_error("failed to send participants file", e))?;
                // Only removed once sent, so a retried delivery still has it.
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove participants file");
                }
            } else {
                warn!(
                    request_id = %request.request_id,
                    path = %path.display(),
                    "participants file is missing, skipping"
                );
            }
        }

        self.forget_status(&request.request_id).await;
        info!(request_id = %request.request_id, "result delivered");
        Ok(())
    }

    async fn deliver_failure(
        &self,
        request: &Request,
        error_kind: &str,
        message: &str,
    ) -> Result<(), RecapError> {
        let chat = user_chat(&request.user_id)?;
        let text = render_failure(request, error_kind, message);
        for chunk in chunk_message(&text, MAX_MESSAGE_CHARS) {
            self.send_text(chat, &chunk).await?;
        }
        self.forget_status(&request.request_id).await;
        info!(request_id = %request.request_id, error_kind, "failure delivered");
        Ok(())
    }
}

/// The actor's DM chat has the same id as the actor.
fn user_chat(user_id: &str) -> Result<ChatId, RecapError> {
    user_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| RecapError::Channel {
            message: format!("invalid Telegram user id `{user_id}`: {e}"),
            source: None,
        })
}

fn is_not_modified(err: &RequestError) -> bool {
    err.to_string().contains("message is not modified")
}

fn channel_error(context: &str, e: RequestError) -> RecapError {
    RecapError::Channel {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
