// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat channel for front-end tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use recap_core::RecapError;
use recap_core::traits::adapter::PluginAdapter;
use recap_core::traits::channel::ChannelAdapter;
use recap_core::types::{AdapterType, HealthStatus, InboundMessage, MessageId, OutboundMessage};

/// Chat channel fed by [`inject_message`](Self::inject_message) and
/// recording every reply.
///
/// Once [`close_inbound`](Self::close_inbound) is called, `receive()` hands
/// out what is already queued and then reports the channel as closed, which
/// ends a front-end loop the same way a dropped bot connection would.
pub struct MockChannel {
    tx: Mutex<Option<mpsc::UnboundedSender<InboundMessage>>>,
    rx: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    replies: Mutex<Vec<OutboundMessage>>,
    next_id: AtomicU64,
}

impl MockChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            replies: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue a message from `sender_id`. Ignored after `close_inbound`.
    pub async fn inject_message(&self, sender_id: &str, text: &str, metadata: Option<&str>) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = InboundMessage {
            id: format!("in-{n}"),
            channel: "mock".to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            metadata: metadata.map(str::to_string),
        };
        if let Some(tx) = self.tx.lock().await.as_ref() {
            let _ = tx.send(msg);
        }
    }

    pub async fn close_inbound(&self) {
        self.tx.lock().await.take();
    }

    /// Replies sent so far, in send order.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.replies.lock().await.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        self.close_inbound().await;
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), RecapError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, RecapError> {
        let mut replies = self.replies.lock().await;
        replies.push(msg);
        Ok(MessageId(format!("out-{}", replies.len())))
    }

    async fn receive(&self) -> Result<InboundMessage, RecapError> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RecapError::Channel {
                message: "mock inbound channel closed".into(),
                source: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_messages_drain_before_close_is_reported() {
        let channel = MockChannel::new();
        channel.inject_message("7", "first", None).await;
        channel
            .inject_message("7", "second", Some(r#"{"chat_id":"1"}"#))
            .await;
        channel.close_inbound().await;
        channel.inject_message("7", "too late", None).await;

        assert_eq!(channel.receive().await.unwrap().text, "first");
        let second = channel.receive().await.unwrap();
        assert_eq!(second.metadata.as_deref(), Some(r#"{"chat_id":"1"}"#));
        let err = channel.receive().await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn replies_are_recorded_in_order() {
        let channel = MockChannel::new();
        for text in ["one", "two"] {
            channel
                .send(OutboundMessage {
                    channel: "mock".to_string(),
                    recipient_id: "7".to_string(),
                    content: text.to_string(),
                    reply_to: None,
                    metadata: None,
                })
                .await
                .unwrap();
        }

        let contents: Vec<_> = channel
            .sent_messages()
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["one", "two"]);
    }
}
