// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the messaging platform the actor talks through.

use async_trait::async_trait;

use crate::error::RecapError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, MessageId, OutboundMessage};

/// Adapter for bidirectional messaging with the actor.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), RecapError>;

    /// Sends a message through the channel.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, RecapError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, RecapError>;
}
