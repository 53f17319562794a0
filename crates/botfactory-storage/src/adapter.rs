// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`Store`] trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use botfactory_config::model::StorageConfig;
use botfactory_core::{
    AdapterType, Bot, BotAnalytics, BotFactoryError, BotId, BotStatus, Conversation,
    ConversationId, HealthStatus, Message, NewMessage, PluginAdapter, Store, Subscription,
    UsageDelta, UserId,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened by [`Store::initialize`]; every other call fails
/// with a persistence error until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, BotFactoryError> {
        self.db
            .get()
            .ok_or_else(|| BotFactoryError::persistence("store not initialized"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn initialize(&self) -> Result<(), BotFactoryError> {
        let path = self.config.database_path.clone();
        let wal_mode = self.config.wal_mode;
        self.db
            .get_or_try_init(|| Database::open(&path, wal_mode))
            .await?;
        debug!(path = %self.config.database_path, "sqlite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BotFactoryError> {
        let db = self.db()?;
        if self.config.wal_mode {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    async fn insert_bot(&self, bot: &Bot) -> Result<(), BotFactoryError> {
        queries::bots::insert_bot(self.db()?, bot).await
    }

    async fn get_bot(&self, id: &BotId) -> Result<Option<Bot>, BotFactoryError> {
        queries::bots::get_bot(self.db()?, id).await
    }

    async fn list_bots(&self, status: Option<BotStatus>) -> Result<Vec<Bot>, BotFactoryError> {
        queries::bots::list_bots(self.db()?, status).await
    }

    async fn set_bot_status(
        &self,
        id: &BotId,
        status: BotStatus,
    ) -> Result<(), BotFactoryError> {
        queries::bots::set_bot_status(self.db()?, id, status).await
    }

    async fn activate_bot_within_limit(
        &self,
        id: &BotId,
        max_active: Option<u32>,
    ) -> Result<bool, BotFactoryError> {
        queries::bots::activate_bot_within_limit(self.db()?, id, max_active).await
    }

    async fn count_active_bots(
        &self,
        owner: &UserId,
        excluding: Option<&BotId>,
    ) -> Result<u32, BotFactoryError> {
        queries::bots::count_active_bots(self.db()?, owner, excluding).await
    }

    async fn touch_bot(&self, id: &BotId, at: DateTime<Utc>) -> Result<(), BotFactoryError> {
        queries::bots::touch_bot(self.db()?, id, at).await
    }

    async fn delete_bot(&self, id: &BotId) -> Result<(), BotFactoryError> {
        queries::bots::delete_bot(self.db()?, id).await
    }

    async fn upsert_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<(), BotFactoryError> {
        queries::subscriptions::upsert_subscription(self.db()?, subscription).await
    }

    async fn get_subscription(
        &self,
        user: &UserId,
    ) -> Result<Option<Subscription>, BotFactoryError> {
        queries::subscriptions::get_subscription(self.db()?, user).await
    }

    async fn consume_message_quota(
        &self,
        user: &UserId,
        period: &str,
        limit: Option<u64>,
    ) -> Result<bool, BotFactoryError> {
        queries::subscriptions::consume_message_quota(self.db()?, user, period, limit).await
    }

    async fn message_usage(&self, user: &UserId, period: &str) -> Result<u64, BotFactoryError> {
        queries::subscriptions::message_usage(self.db()?, user, period).await
    }

    async fn conversation_for(
        &self,
        bot: &BotId,
        external_user_id: &str,
    ) -> Result<(Conversation, bool), BotFactoryError> {
        queries::conversations::conversation_for(self.db()?, bot, external_user_id).await
    }

    async fn list_conversations(
        &self,
        bot: &BotId,
    ) -> Result<Vec<Conversation>, BotFactoryError> {
        queries::conversations::list_conversations(self.db()?, bot).await
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, BotFactoryError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn recent_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, BotFactoryError> {
        queries::messages::recent_messages(self.db()?, conversation, limit).await
    }

    async fn record_usage(&self, delta: &UsageDelta) -> Result<(), BotFactoryError> {
        queries::analytics::record_usage(self.db()?, delta).await
    }

    async fn analytics(
        &self,
        bot: &BotId,
        since: Option<NaiveDate>,
    ) -> Result<Vec<BotAnalytics>, BotFactoryError> {
        queries::analytics::analytics(self.db()?, bot, since).await
    }
}
