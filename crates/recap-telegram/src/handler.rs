// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound filtering: who may talk to the bot, and where.
//!
//! Only private chats with allow-listed users reach the conversation
//! layer. Everything else is dropped before it becomes an
//! [`InboundMessage`].

use recap_core::types::InboundMessage;
use teloxide::prelude::*;
use teloxide::types::ChatKind;

/// Whether the sender appears in `allowed_users`, by numeric id or by
/// username (`@` optional, case-insensitive).
///
/// An empty allow-list admits nobody. Messages without a sender never pass.
pub fn is_authorized(msg: &Message, allowed_users: &[String]) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    let user_id = user.id.0.to_string();
    let username = user.username.as_deref();

    allowed_users.iter().any(|entry| {
        entry == &user_id
            || username.is_some_and(|name| {
                name.eq_ignore_ascii_case(entry.strip_prefix('@').unwrap_or(entry))
            })
    })
}

/// Requests are only taken in private chats.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Returns the text the actor typed, or `None` for anything else
/// (stickers, media without caption, service messages).
pub fn extract_text(msg: &Message) -> Option<&str> {
    msg.text()
        .or_else(|| msg.caption())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Maps a private message onto the channel-agnostic inbound shape.
///
/// The sender id doubles as the conversation key. The chat id is carried in
/// metadata so replies go back to the same chat.
pub fn to_inbound_message(msg: &Message, text: &str) -> InboundMessage {
    let sender_id = msg
        .from
        .as_ref()
        .map_or_else(|| "unknown".to_string(), |u| u.id.0.to_string());

    InboundMessage {
        id: msg.id.0.to_string(),
        channel: "telegram".to_string(),
        sender_id,
        text: text.to_string(),
        timestamp: msg.date.to_rfc3339(),
        metadata: Some(serde_json::json!({ "chat_id": msg.chat.id.0.to_string() }).to_string()),
    }
}
