// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable bounded message window for one conversation.

use std::collections::VecDeque;

use botfactory_config::model::ContextConfig;
use botfactory_core::Message;

/// Count and token bounds applied to every window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_messages: usize,
    pub max_tokens: u32,
}

impl ContextLimits {
    /// Both bounds are raised to at least 1 so the newest message always fits.
    pub fn new(max_messages: usize, max_tokens: u32) -> Self {
        Self {
            max_messages: max_messages.max(1),
            max_tokens: max_tokens.max(1),
        }
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self::new(config.max_messages, config.max_tokens)
    }
}

/// A message held in a context window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub message: Message,
    /// Token count of the message (recorded or estimated).
    pub tokens: u32,
    /// The message alone exceeds the token budget and must be truncated
    /// before it is sent to the completion service.
    pub oversized: bool,
}

impl ContextEntry {
    /// Tokens charged against the budget. An oversized entry is charged just
    /// over the budget, so it can only ever be the sole entry of its window.
    fn charged(&self, limits: ContextLimits) -> u64 {
        if self.oversized {
            u64::from(limits.max_tokens) + 1
        } else {
            u64::from(self.tokens)
        }
    }
}

/// Most recent messages of a conversation, oldest first.
///
/// Windows are never mutated in place; [`ContextWindow::appended`] returns a
/// new window so readers can keep a snapshot while a writer swaps in the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    entries: VecDeque<ContextEntry>,
    charged_tokens: u64,
}

impl ContextWindow {
    pub fn from_messages(messages: impl IntoIterator<Item = Message>, limits: ContextLimits) -> Self {
        messages
            .into_iter()
            .fold(Self::default(), |window, message| window.appended(message, limits).0)
    }

    /// Builds the entry `message` would become if appended to this window.
    ///
    /// A timestamp older than the newest entry is raised to it so timestamps
    /// never go backwards.
    pub fn entry_for(&self, mut message: Message, limits: ContextLimits) -> ContextEntry {
        if let Some(last) = self.entries.back()
            && message.timestamp < last.message.timestamp
        {
            message.timestamp = last.message.timestamp;
        }
        let tokens = message.tokens();
        ContextEntry {
            message,
            tokens,
            oversized: tokens > limits.max_tokens,
        }
    }

    /// Returns a new window with `message` appended and the oldest entries
    /// evicted until both bounds hold, plus the number evicted.
    pub fn appended(&self, message: Message, limits: ContextLimits) -> (Self, usize) {
        let entry = self.entry_for(message, limits);
        let mut next = self.clone();
        next.charged_tokens += entry.charged(limits);
        next.entries.push_back(entry);

        let mut evicted = 0;
        // The newest entry is never evicted.
        while next.entries.len() > 1
            && (next.entries.len() > limits.max_messages
                || next.charged_tokens > u64::from(limits.max_tokens))
        {
            let Some(oldest) = next.entries.pop_front() else {
                break;
            };
            next.charged_tokens -= oldest.charged(limits);
            evicted += 1;
        }
        (next, evicted)
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &ContextEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ContextEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the entries' token counts.
    pub fn total_tokens(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.tokens)).sum()
    }
}

#[cfg(test)]
mod tests {
    use botfactory_core::{ConversationId, MessageId, Role};
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn message(n: i64, tokens: u32) -> Message {
        Message {
            id: MessageId(format!("m{n}")),
            conversation_id: ConversationId::from("c1"),
            role: Role::User,
            content: format!("message {n}"),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(n),
            token_count: Some(tokens),
            latency_ms: None,
        }
    }

    #[test]
    fn evicts_oldest_by_count() {
        let limits = ContextLimits::new(3, 1_000);
        let window = ContextWindow::from_messages((0..5).map(|n| message(n, 1)), limits);
        let ids: Vec<_> = window.entries().map(|e| e.message.id.0.clone()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn evicts_oldest_by_tokens() {
        let limits = ContextLimits::new(10, 100);
        let window = ContextWindow::default();
        let (window, _) = window.appended(message(0, 60), limits);
        let (window, evicted) = window.appended(message(1, 50), limits);
        assert_eq!(evicted, 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window.total_tokens(), 50);
    }

    #[test]
    fn oversized_message_is_kept_and_flagged() {
        let limits = ContextLimits::new(10, 100);
        let (window, _) = ContextWindow::default().appended(message(0, 10), limits);
        let (window, evicted) = window.appended(message(1, 500), limits);
        assert_eq!(evicted, 1);
        assert_eq!(window.len(), 1);
        let last = window.last().unwrap();
        assert!(last.oversized);
        assert_eq!(last.tokens, 500);
    }

    #[test]
    fn oversized_entry_is_evicted_by_the_next_message() {
        let limits = ContextLimits::new(10, 100);
        let (window, _) = ContextWindow::default().appended(message(0, 500), limits);
        let (window, _) = window.appended(message(1, 10), limits);
        assert_eq!(window.len(), 1);
        assert!(!window.last().unwrap().oversized);
    }

    #[test]
    fn backdated_message_is_raised_to_latest_timestamp() {
        let limits = ContextLimits::new(10, 1_000);
        let (window, _) = ContextWindow::default().appended(message(5, 1), limits);
        let (window, _) = window.appended(message(1, 1), limits);
        let timestamps: Vec<_> = window.entries().map(|e| e.message.timestamp).collect();
        assert_eq!(timestamps[0], timestamps[1]);
    }

    #[test]
    fn missing_token_count_is_estimated() {
        let limits = ContextLimits::new(10, 1_000);
        let mut msg = message(0, 0);
        msg.token_count = None;
        msg.content = "x".repeat(40);
        let (window, _) = ContextWindow::default().appended(msg, limits);
        assert_eq!(window.last().unwrap().tokens, 10);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let limits = ContextLimits::new(0, 0);
        assert_eq!(limits, ContextLimits::new(1, 1));
    }
}
