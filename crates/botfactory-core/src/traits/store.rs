// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store trait for bots, subscriptions, conversations, messages
//! and analytics.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::BotFactoryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Bot, BotAnalytics, BotId, BotStatus, Conversation, ConversationId, Message, NewMessage,
    Subscription, UsageDelta, UserId,
};

/// Transactional access to the records the runtime reads and writes.
///
/// Every method is atomic with respect to concurrent callers. The three
/// compound operations ([`Store::append_message`],
/// [`Store::consume_message_quota`], [`Store::activate_bot_within_limit`])
/// exist so that check-then-write sequences never race.
#[async_trait]
pub trait Store: PluginAdapter {
    /// Prepares the backend (schema migrations, connection).
    async fn initialize(&self) -> Result<(), BotFactoryError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), BotFactoryError>;

    async fn insert_bot(&self, bot: &Bot) -> Result<(), BotFactoryError>;

    async fn get_bot(&self, id: &BotId) -> Result<Option<Bot>, BotFactoryError>;

    /// Lists bots, optionally restricted to one status.
    async fn list_bots(&self, status: Option<BotStatus>) -> Result<Vec<Bot>, BotFactoryError>;

    /// Overwrites the status. Fails with `BotNotFound` for unknown ids.
    async fn set_bot_status(&self, id: &BotId, status: BotStatus)
    -> Result<(), BotFactoryError>;

    /// Marks the bot ACTIVE if its owner has fewer than `max_active` other
    /// ACTIVE bots (`None` = unlimited). Returns `false` when the limit is
    /// reached, also for a bot that is already ACTIVE; its status is then
    /// left as it was.
    async fn activate_bot_within_limit(
        &self,
        id: &BotId,
        max_active: Option<u32>,
    ) -> Result<bool, BotFactoryError>;

    /// Counts the owner's ACTIVE bots, leaving out `excluding` if given.
    async fn count_active_bots(
        &self,
        owner: &UserId,
        excluding: Option<&BotId>,
    ) -> Result<u32, BotFactoryError>;

    /// Records the bot's most recent activity.
    async fn touch_bot(&self, id: &BotId, at: DateTime<Utc>) -> Result<(), BotFactoryError>;

    /// Removes the bot with its conversations, messages and analytics.
    async fn delete_bot(&self, id: &BotId) -> Result<(), BotFactoryError>;

    async fn upsert_subscription(&self, subscription: &Subscription)
    -> Result<(), BotFactoryError>;

    async fn get_subscription(&self, user: &UserId)
    -> Result<Option<Subscription>, BotFactoryError>;

    /// Increments the user's message counter for `period` unless it already
    /// reached `limit` (`None` = unlimited). Returns whether it was incremented.
    async fn consume_message_quota(
        &self,
        user: &UserId,
        period: &str,
        limit: Option<u64>,
    ) -> Result<bool, BotFactoryError>;

    /// Messages consumed by the user in `period`.
    async fn message_usage(&self, user: &UserId, period: &str) -> Result<u64, BotFactoryError>;

    /// Fetches the conversation for `(bot, external_user_id)`, creating it on
    /// first contact. The flag is `true` when it was created by this call.
    async fn conversation_for(
        &self,
        bot: &BotId,
        external_user_id: &str,
    ) -> Result<(Conversation, bool), BotFactoryError>;

    async fn list_conversations(&self, bot: &BotId)
    -> Result<Vec<Conversation>, BotFactoryError>;

    /// Appends a message, raising its timestamp to the conversation's latest
    /// one if it would otherwise go backwards. Returns the recorded message.
    async fn append_message(&self, message: NewMessage) -> Result<Message, BotFactoryError>;

    /// The `limit` most recent messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, BotFactoryError>;

    /// Adds a delta to the bot's analytics bucket, creating it if needed.
    async fn record_usage(&self, delta: &UsageDelta) -> Result<(), BotFactoryError>;

    /// Analytics buckets for a bot, oldest first, optionally from `since`.
    async fn analytics(
        &self,
        bot: &BotId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<BotAnalytics>, BotFactoryError>;
}
