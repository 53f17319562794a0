// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly.

use std::borrow::Cow;

use botfactory_context::ContextEntry;
use botfactory_core::{CompletionRequest, PromptTurn, Role, estimate_tokens};

/// Characters per token, matching [`estimate_tokens`].
const CHARS_PER_TOKEN: usize = 4;

/// Builds the request: personality as the system prompt, then the context
/// oldest first, then the new user message.
///
/// Flagged context entries and an oversized new message are cut down to
/// `token_budget` tokens.
pub fn build_request(
    personality: &str,
    context: &[ContextEntry],
    new_message: &str,
    token_budget: u32,
    max_output_tokens: u32,
) -> CompletionRequest {
    let mut turns: Vec<PromptTurn> = context
        .iter()
        .map(|entry| PromptTurn {
            role: entry.message.role,
            content: if entry.oversized {
                truncate_to_tokens(&entry.message.content, token_budget).into_owned()
            } else {
                entry.message.content.clone()
            },
        })
        .collect();
    turns.push(PromptTurn {
        role: Role::User,
        content: truncate_to_tokens(new_message, token_budget).into_owned(),
    });

    CompletionRequest {
        system_prompt: personality.to_string(),
        turns,
        max_output_tokens: Some(max_output_tokens),
    }
}

/// Keeps the leading part of `text` that fits in `max_tokens`.
pub fn truncate_to_tokens(text: &str, max_tokens: u32) -> Cow<'_, str> {
    if estimate_tokens(text) <= max_tokens {
        return Cow::Borrowed(text);
    }
    let max_chars = (max_tokens as usize).saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => Cow::Owned(text[..end].to_string()),
        None => Cow::Borrowed(text),
    }
}
