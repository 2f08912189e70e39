// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram adapters for the recap job orchestrator.
//!
//! [`TelegramChannel`] implements [`ChannelAdapter`] over long polling for
//! the conversation front-end. [`TelegramDelivery`] implements
//! [`DeliveryAdapter`](recap_core::traits::DeliveryAdapter) for job status
//! and results, sharing the same bot.

pub mod delivery;
pub mod handler;
pub mod render;

use std::sync::Arc;

use async_trait::async_trait;
use recap_config::model::TelegramConfig;
use recap_core::error::RecapError;
use recap_core::traits::{ChannelAdapter, PluginAdapter};
use recap_core::types::{AdapterType, HealthStatus, InboundMessage, MessageId, OutboundMessage};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ReplyParameters};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use delivery::TelegramDelivery;

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Connects to Telegram via long polling and forwards authorized DMs.
pub struct TelegramChannel {
    bot: Bot,
    config: TelegramConfig,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: TelegramConfig) -> Result<Self, RecapError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            RecapError::Config("telegram.bot_token is required for Telegram adapter".into())
        })?;

        if token.is_empty() {
            return Err(RecapError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(100);

        Ok(Self {
            bot,
            config,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    /// Delivery adapter sharing this channel's bot.
    pub fn delivery(&self) -> TelegramDelivery {
        TelegramDelivery::new(self.bot.clone())
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        // Check if the bot token is valid by calling getMe.
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), RecapError> {
        if self.polling_handle.is_some() {
            return Ok(()); // Already connected
        }

        let bot = self.bot.clone();
        let tx = self.inbound_tx.clone();
        let allowed_users: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());

        if allowed_users.is_empty() {
            warn!("telegram.allowed_users is empty; every message will be ignored");
        }
        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message| {
                let tx = tx.clone();
                let allowed = allowed_users.clone();
                async move {
                    // Filter: DMs only
                    if !handler::is_dm(&msg) {
                        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
                        return respond(());
                    }

                    // Filter: authorized users only
                    if !handler::is_authorized(&msg, &allowed) {
                        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
                        return respond(());
                    }

                    match handler::extract_text(&msg) {
                        Some(text) => {
                            let inbound = handler::to_inbound_message(&msg, text);
                            if tx.send(inbound).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => {
                            debug!(msg_id = msg.id.0, "ignoring message without text");
                        }
                    }

                    respond(())
                }
            });

            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {}) // Silently ignore non-message updates
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, RecapError> {
        let chat_id = extract_chat_id(&msg)?;
        let mut request = self.bot.send_message(chat_id, &msg.content);
        if let Some(reply_to) = msg.reply_to.as_deref().and_then(|id| id.parse::<i32>().ok()) {
            request = request.reply_parameters(
                ReplyParameters::new(teloxide::types::MessageId(reply_to))
                    .allow_sending_without_reply(),
            );
        }
        let sent = request.await.map_err(|e| RecapError::Channel {
            message: format!("failed to send message: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn receive(&self) -> Result<InboundMessage, RecapError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| RecapError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }
}

/// Extracts the chat ID from an outbound message's metadata, falling back
/// to the recipient id.
fn extract_chat_id(msg: &OutboundMessage) -> Result<ChatId, RecapError> {
    if let Some(ref metadata) = msg.metadata
        && let Ok(meta) = serde_json::from_str::<serde_json::Value>(metadata)
        && let Some(chat_id_str) = meta.get("chat_id").and_then(|v| v.as_str())
    {
        let id = chat_id_str.parse::<i64>().map_err(|e| RecapError::Channel {
            message: format!("invalid chat_id in metadata: {e}"),
            source: None,
        })?;
        return Ok(ChatId(id));
    }

    msg.recipient_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| RecapError::Channel {
            message: "no valid chat_id in message metadata or recipient".into(),
            source: None,
        })
}
