// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update filtering and conversion into [`InboundMessage`].

use std::sync::LazyLock;

use botfactory_core::{ConnectionError, InboundMessage};
use regex::Regex;
use teloxide::types::Message;

/// Telegram's limit on the length of one text message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]{35}$").expect("token pattern is valid"));

/// Checks the shape of a bot token before any network call.
pub fn validate_token(token: &str) -> Result<(), ConnectionError> {
    if TOKEN_PATTERN.is_match(token) {
        Ok(())
    } else {
        Err(ConnectionError::Rejected(
            "Telegram bot token has an invalid format".into(),
        ))
    }
}

/// Converts a Telegram message into an [`InboundMessage`].
///
/// Only text messages from human senders are delivered; everything else
/// yields `None`. The chat id becomes the external user id so replies go
/// back to the same chat.
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    if msg.from.as_ref().is_some_and(|user| user.is_bot) {
        return None;
    }
    Some(InboundMessage {
        external_user_id: msg.chat.id.0.to_string(),
        text: text.to_string(),
        timestamp: msg.date,
        sender_name: msg.from.as_ref().map(|user| user.full_name()),
    })
}

/// Splits `text` into pieces Telegram accepts, preferring newline breaks.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            for ch in line.chars() {
                if current_len == max_chars {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
