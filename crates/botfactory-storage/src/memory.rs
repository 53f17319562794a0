// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volatile [`Store`] for tests and throwaway deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use botfactory_core::{
    AdapterType, Bot, BotAnalytics, BotFactoryError, BotId, BotStatus, Conversation,
    ConversationId, HealthStatus, Message, MessageId, NewMessage, PluginAdapter, Store,
    Subscription, UsageDelta, UserId,
};

#[derive(Default)]
struct State {
    bots: HashMap<BotId, Bot>,
    subscriptions: HashMap<UserId, Subscription>,
    usage: HashMap<(UserId, String), u64>,
    conversations: HashMap<ConversationId, Conversation>,
    conversation_index: HashMap<(BotId, String), ConversationId>,
    messages: HashMap<ConversationId, Vec<Message>>,
    analytics: BTreeMap<(BotId, NaiveDate), BotAnalytics>,
}

impl State {
    fn active_bots(&self, owner: &UserId, excluding: Option<&BotId>) -> u32 {
        let count = self
            .bots
            .values()
            .filter(|b| {
                &b.owner == owner
                    && excluding != Some(&b.id)
                    && b.status == BotStatus::Active
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Store that keeps everything in process memory.
///
/// One mutex guards all tables, so each trait call is atomic. The lock is
/// never held across an `.await`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn initialize(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }

    async fn insert_bot(&self, bot: &Bot) -> Result<(), BotFactoryError> {
        let mut state = self.state();
        if state.bots.contains_key(&bot.id) {
            return Err(BotFactoryError::persistence(format!(
                "bot {} already exists",
                bot.id
            )));
        }
        state.bots.insert(bot.id.clone(), bot.clone());
        Ok(())
    }

    async fn get_bot(&self, id: &BotId) -> Result<Option<Bot>, BotFactoryError> {
        Ok(self.state().bots.get(id).cloned())
    }

    async fn list_bots(&self, status: Option<BotStatus>) -> Result<Vec<Bot>, BotFactoryError> {
        let mut bots: Vec<Bot> = self
            .state()
            .bots
            .values()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(bots)
    }

    async fn set_bot_status(
        &self,
        id: &BotId,
        status: BotStatus,
    ) -> Result<(), BotFactoryError> {
        let mut state = self.state();
        let bot = state
            .bots
            .get_mut(id)
            .ok_or_else(|| BotFactoryError::BotNotFound(id.clone()))?;
        bot.status = status;
        Ok(())
    }

    async fn activate_bot_within_limit(
        &self,
        id: &BotId,
        max_active: Option<u32>,
    ) -> Result<bool, BotFactoryError> {
        let mut state = self.state();
        let owner = state
            .bots
            .get(id)
            .map(|b| b.owner.clone())
            .ok_or_else(|| BotFactoryError::BotNotFound(id.clone()))?;
        if let Some(limit) = max_active
            && state.active_bots(&owner, Some(id)) >= limit
        {
            return Ok(false);
        }
        if let Some(bot) = state.bots.get_mut(id) {
            bot.status = BotStatus::Active;
        }
        Ok(true)
    }

    async fn count_active_bots(
        &self,
        owner: &UserId,
        excluding: Option<&BotId>,
    ) -> Result<u32, BotFactoryError> {
        Ok(self.state().active_bots(owner, excluding))
    }

    async fn touch_bot(&self, id: &BotId, at: DateTime<Utc>) -> Result<(), BotFactoryError> {
        if let Some(bot) = self.state().bots.get_mut(id) {
            bot.last_active = Some(at);
        }
        Ok(())
    }

    async fn delete_bot(&self, id: &BotId) -> Result<(), BotFactoryError> {
        let mut state = self.state();
        if state.bots.remove(id).is_none() {
            return Err(BotFactoryError::BotNotFound(id.clone()));
        }
        let removed: Vec<ConversationId> = state
            .conversations
            .values()
            .filter(|c| &c.bot_id == id)
            .map(|c| c.id.clone())
            .collect();
        for conversation in &removed {
            state.conversations.remove(conversation);
            state.messages.remove(conversation);
        }
        state.conversation_index.retain(|(bot, _), _| bot != id);
        state.analytics.retain(|(bot, _), _| bot != id);
        Ok(())
    }

    async fn upsert_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<(), BotFactoryError> {
        self.state()
            .subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn get_subscription(
        &self,
        user: &UserId,
    ) -> Result<Option<Subscription>, BotFactoryError> {
        Ok(self.state().subscriptions.get(user).cloned())
    }

    async fn consume_message_quota(
        &self,
        user: &UserId,
        period: &str,
        limit: Option<u64>,
    ) -> Result<bool, BotFactoryError> {
        let mut state = self.state();
        let used = state
            .usage
            .entry((user.clone(), period.to_string()))
            .or_insert(0);
        if limit.is_some_and(|limit| *used >= limit) {
            return Ok(false);
        }
        *used += 1;
        Ok(true)
    }

    async fn message_usage(&self, user: &UserId, period: &str) -> Result<u64, BotFactoryError> {
        Ok(self
            .state()
            .usage
            .get(&(user.clone(), period.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn conversation_for(
        &self,
        bot: &BotId,
        external_user_id: &str,
    ) -> Result<(Conversation, bool), BotFactoryError> {
        let mut state = self.state();
        if !state.bots.contains_key(bot) {
            return Err(BotFactoryError::BotNotFound(bot.clone()));
        }
        let index_key = (bot.clone(), external_user_id.to_string());
        if let Some(existing) = state
            .conversation_index
            .get(&index_key)
            .and_then(|id| state.conversations.get(id))
        {
            return Ok((existing.clone(), false));
        }

        let conversation = Conversation {
            id: ConversationId(uuid::Uuid::new_v4().to_string()),
            bot_id: bot.clone(),
            external_user_id: external_user_id.to_string(),
            started_at: Utc::now(),
            last_message_at: None,
            message_count: 0,
        };
        state
            .conversation_index
            .insert(index_key, conversation.id.clone());
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok((conversation, true))
    }

    async fn list_conversations(
        &self,
        bot: &BotId,
    ) -> Result<Vec<Conversation>, BotFactoryError> {
        let mut conversations: Vec<Conversation> = self
            .state()
            .conversations
            .values()
            .filter(|c| &c.bot_id == bot)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, BotFactoryError> {
        let mut state = self.state();
        let conversation = state
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| {
                BotFactoryError::persistence(format!(
                    "unknown conversation {}",
                    message.conversation_id
                ))
            })?;

        let timestamp = match conversation.last_message_at {
            Some(last) if message.timestamp < last => last,
            _ => message.timestamp,
        };
        conversation.message_count += 1;
        conversation.last_message_at = Some(timestamp);

        let recorded = Message {
            id: MessageId(uuid::Uuid::new_v4().to_string()),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            timestamp,
            token_count: message.token_count,
            latency_ms: message.latency_ms,
        };
        state
            .messages
            .entry(recorded.conversation_id.clone())
            .or_default()
            .push(recorded.clone());
        Ok(recorded)
    }

    async fn recent_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, BotFactoryError> {
        let state = self.state();
        let history = state
            .messages
            .get(conversation)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }

    async fn record_usage(&self, delta: &UsageDelta) -> Result<(), BotFactoryError> {
        let mut state = self.state();
        let bucket = state
            .analytics
            .entry((delta.bot_id.clone(), delta.bucket))
            .or_insert_with(|| BotAnalytics {
                bot_id: delta.bot_id.clone(),
                bucket: delta.bucket,
                messages_processed: 0,
                tokens_consumed: 0,
                total_latency_ms: 0,
                new_conversations: 0,
            });
        bucket.messages_processed = bucket.messages_processed.saturating_add(delta.messages);
        bucket.tokens_consumed = bucket.tokens_consumed.saturating_add(delta.tokens);
        bucket.total_latency_ms = bucket.total_latency_ms.saturating_add(delta.latency_ms);
        bucket.new_conversations = bucket
            .new_conversations
            .saturating_add(delta.new_conversations);
        Ok(())
    }

    async fn analytics(
        &self,
        bot: &BotId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<BotAnalytics>, BotFactoryError> {
        Ok(self
            .state()
            .analytics
            .values()
            .filter(|a| &a.bot_id == bot && since.is_none_or(|since| a.bucket >= since))
            .cloned()
            .collect())
    }
}
