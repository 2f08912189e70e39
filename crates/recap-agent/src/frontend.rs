// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Front-end loop: receives actor messages from the chat channel and runs
//! one conversation turn per message.
//!
//! Turns run concurrently. Long-running work never happens here; the worker
//! pool does it, and the event relay reports back.

use std::sync::Arc;
use std::time::Duration;

use recap_core::types::{InboundMessage, OutboundMessage};
use recap_core::{ChannelAdapter, RecapError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationMachine;
use crate::shutdown;

/// How long in-flight turns may take to finish after shutdown was requested.
const TURN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates message flow between the chat channel and the conversation machine.
pub struct FrontendLoop {
    channel: Arc<dyn ChannelAdapter>,
    machine: Arc<ConversationMachine>,
}

impl FrontendLoop {
    /// The channel must already be connected.
    pub fn new(channel: Arc<dyn ChannelAdapter>, machine: Arc<ConversationMachine>) -> Self {
        Self { channel, machine }
    }

    /// Runs until the cancellation token is triggered or the channel closes,
    /// then drains in-flight turns.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RecapError> {
        info!("front-end loop running");
        let mut turns = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping front-end loop");
                    break;
                }
                Some(joined) = turns.join_next(), if !turns.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "conversation turn panicked");
                    }
                }
                msg = self.channel.receive() => match msg {
                    Ok(inbound) => {
                        let channel = self.channel.clone();
                        let machine = self.machine.clone();
                        turns.spawn(async move { handle_turn(channel, machine, inbound).await });
                    }
                    Err(e) if is_closed(&e) => {
                        warn!(error = %e, "channel closed, stopping front-end loop");
                        break;
                    }
                    Err(e) => error!(error = %e, "channel receive error"),
                },
            }
        }

        shutdown::drain_tasks(&mut turns, TURN_DRAIN_TIMEOUT).await;
        info!("front-end loop stopped");
        Ok(())
    }
}

async fn handle_turn(
    channel: Arc<dyn ChannelAdapter>,
    machine: Arc<ConversationMachine>,
    inbound: InboundMessage,
) {
    debug!(
        sender_id = inbound.sender_id.as_str(),
        channel = inbound.channel.as_str(),
        "handling inbound message"
    );

    let reply = machine.handle_message(&inbound.sender_id, &inbound.text).await;

    let recipient_id =
        extract_chat_id_from_metadata(&inbound.metadata).unwrap_or_else(|| inbound.sender_id.clone());
    let out = OutboundMessage {
        channel: inbound.channel.clone(),
        recipient_id,
        content: reply.to_string(),
        reply_to: Some(inbound.id.clone()),
        metadata: inbound.metadata.clone(),
    };
    if let Err(e) = channel.send(out).await {
        error!(sender_id = inbound.sender_id.as_str(), error = %e, "failed to send reply");
    }
}

fn is_closed(err: &RecapError) -> bool {
    matches!(err, RecapError::Channel { message, .. } if message.contains("closed"))
}

/// Extracts chat_id from an optional JSON metadata string.
fn extract_chat_id_from_metadata(metadata: &Option<String>) -> Option<String> {
    metadata.as_ref().and_then(|m| {
        serde_json::from_str::<serde_json::Value>(m)
            .ok()
            .and_then(|v| v.get("chat_id").and_then(|c| c.as_str()).map(String::from))
    })
}
