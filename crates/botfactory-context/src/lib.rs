// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context manager.
//!
//! Keeps a bounded window of recent messages per conversation. Each window
//! is an immutable snapshot behind an [`ArcSwap`]: readers load the current
//! snapshot without locking, writers publish a replacement with a
//! compare-and-swap loop. A reader therefore never waits for a writer and
//! always sees either the state before or after an append.

pub mod window;

use std::sync::Arc;

use arc_swap::ArcSwap;
use botfactory_core::{BotId, ConversationKey, Message};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

pub use window::{ContextEntry, ContextLimits, ContextWindow};

/// Bounded, concurrently readable message history keyed by conversation.
#[derive(Debug)]
pub struct ConversationContextManager {
    limits: ContextLimits,
    windows: DashMap<ConversationKey, Arc<ArcSwap<ContextWindow>>>,
}

impl ConversationContextManager {
    pub fn new(limits: ContextLimits) -> Self {
        Self {
            limits,
            windows: DashMap::new(),
        }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Appends `message` to the conversation and returns the entry as stored.
    pub fn append(&self, key: &ConversationKey, message: Message) -> ContextEntry {
        let slot = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(ContextWindow::default())))
            .clone();

        let limits = self.limits;
        let mut evicted = 0;
        let previous = slot.rcu(|current| {
            let (next, n) = current.appended(message.clone(), limits);
            evicted = n;
            next
        });

        if evicted > 0 {
            debug!(conversation = %key, evicted, "context window evicted oldest messages");
            metrics::counter!("botfactory_context_evictions_total").increment(evicted as u64);
        }

        let entry = previous.entry_for(message, limits);
        if entry.oversized {
            debug!(
                conversation = %key,
                tokens = entry.tokens,
                budget = limits.max_tokens,
                "message exceeds the context token budget"
            );
        }
        entry
    }

    /// Current window of the conversation, oldest first.
    pub fn get_context(&self, key: &ConversationKey) -> Vec<ContextEntry> {
        self.snapshot(key).entries().cloned().collect()
    }

    /// Shared snapshot of the current window; empty for unknown keys.
    pub fn snapshot(&self, key: &ConversationKey) -> Arc<ContextWindow> {
        self.windows
            .get(key)
            .map(|slot| slot.load_full())
            .unwrap_or_default()
    }

    /// Seeds a conversation that has no live state yet.
    ///
    /// Returns `false` (and changes nothing) when the key is already present,
    /// so hydration never overwrites messages appended in the meantime.
    pub fn hydrate(&self, key: &ConversationKey, history: Vec<Message>) -> bool {
        match self.windows.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                let count = history.len();
                let window = ContextWindow::from_messages(history, self.limits);
                vacant.insert(Arc::new(ArcSwap::from_pointee(window)));
                debug!(conversation = %key, loaded = count, "hydrated conversation context");
                true
            }
        }
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.windows.contains_key(key)
    }

    /// Drops the conversation's window.
    pub fn forget(&self, key: &ConversationKey) {
        self.windows.remove(key);
    }

    /// Drops every window belonging to `bot_id`.
    pub fn forget_bot(&self, bot_id: &BotId) {
        self.windows.retain(|key, _| &key.bot_id != bot_id);
    }

    /// Number of conversations with live state.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use botfactory_core::{ConversationId, MessageId, Role};
    use chrono::Utc;

    use super::*;

    fn key(user: &str) -> ConversationKey {
        ConversationKey::new(BotId::from("b1"), user)
    }

    fn msg(id: &str, content: &str) -> Message {
        Message {
            id: MessageId::from(id),
            conversation_id: ConversationId::from("c1"),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            token_count: None,
            latency_ms: None,
        }
    }

    #[test]
    fn appended_message_is_last_in_context() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        manager.append(&key("u1"), msg("m1", "hello"));
        manager.append(&key("u1"), msg("m2", "again"));
        let context = manager.get_context(&key("u1"));
        assert_eq!(context.len(), 2);
        assert_eq!(context.last().unwrap().message.id, MessageId::from("m2"));
    }

    #[test]
    fn conversations_are_isolated() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        manager.append(&key("u1"), msg("m1", "hello"));
        assert!(manager.get_context(&key("u2")).is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_appends() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        manager.append(&key("u1"), msg("m1", "hello"));
        let before = manager.snapshot(&key("u1"));
        manager.append(&key("u1"), msg("m2", "again"));
        assert_eq!(before.len(), 1);
        assert_eq!(manager.snapshot(&key("u1")).len(), 2);
    }

    #[test]
    fn hydrate_does_not_overwrite_live_state() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        assert!(manager.hydrate(&key("u1"), vec![msg("old", "from store")]));
        assert!(!manager.hydrate(&key("u1"), vec![]));
        manager.append(&key("u1"), msg("new", "live"));
        let ids: Vec<_> = manager
            .get_context(&key("u1"))
            .into_iter()
            .map(|e| e.message.id)
            .collect();
        assert_eq!(ids, vec![MessageId::from("old"), MessageId::from("new")]);
    }

    #[test]
    fn forgotten_conversation_can_be_hydrated_again() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        manager.append(&key("u1"), msg("m1", "hello"));
        manager.append(&key("u2"), msg("m2", "other"));

        manager.forget(&key("u1"));

        assert!(!manager.contains(&key("u1")));
        assert!(manager.contains(&key("u2")));
        assert!(manager.hydrate(&key("u1"), vec![msg("m1", "hello"), msg("m3", "stored")]));
        assert_eq!(manager.get_context(&key("u1")).len(), 2);
    }

    #[test]
    fn forget_bot_only_drops_that_bot() {
        let manager = ConversationContextManager::new(ContextLimits::new(5, 1_000));
        manager.append(&key("u1"), msg("m1", "a"));
        let other = ConversationKey::new(BotId::from("b2"), "u1");
        manager.append(&other, msg("m2", "b"));
        manager.forget_bot(&BotId::from("b1"));
        assert!(!manager.contains(&key("u1")));
        assert!(manager.contains(&other));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_all_recorded() {
        let manager = Arc::new(ConversationContextManager::new(ContextLimits::new(1_000, 100_000)));
        let mut handles = Vec::new();
        for t in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    manager.append(&key("u1"), msg(&format!("t{t}-{i}"), "x"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(manager.get_context(&key("u1")).len(), 400);
    }
}
