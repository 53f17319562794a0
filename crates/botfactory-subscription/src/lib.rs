// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription tier enforcement.
//!
//! [`SubscriptionGate`] answers two questions: may this bot go ACTIVE, and
//! may this bot answer one more message. Counters live in the [`Store`],
//! whose compound operations make check-and-increment a single atomic step,
//! so concurrent workers can never overshoot a quota.

use std::sync::Arc;

use botfactory_config::model::SubscriptionConfig;
use botfactory_core::{Bot, BotFactoryError, Store, Tier, TierLimits, UserId};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Fraction of the message quota at which a warning is logged.
const WARN_RATIO: f64 = 0.8;

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied, with a human-readable reason.
    Denied(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    /// Converts a denial into [`BotFactoryError::QuotaExceeded`].
    pub fn into_result(self) -> Result<(), BotFactoryError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(BotFactoryError::QuotaExceeded { reason }),
        }
    }
}

/// Billing period key for `now`: the calendar month, e.g. `2026-03`.
pub fn period_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Enforces per-tier limits on active bots and processed messages.
pub struct SubscriptionGate {
    store: Arc<dyn Store>,
    limits: SubscriptionConfig,
}

impl SubscriptionGate {
    pub fn new(store: Arc<dyn Store>, limits: SubscriptionConfig) -> Self {
        Self { store, limits }
    }

    /// Effective tier of `owner`. Missing or inactive subscriptions are FREE.
    pub async fn tier_for(&self, owner: &UserId) -> Result<Tier, BotFactoryError> {
        Ok(self
            .store
            .get_subscription(owner)
            .await?
            .map(|sub| sub.effective_tier())
            .unwrap_or(Tier::Free))
    }

    pub async fn limits_for(&self, owner: &UserId) -> Result<TierLimits, BotFactoryError> {
        let tier = self.tier_for(owner).await?;
        Ok(self.limits.limits_for(tier))
    }

    /// Read-only pre-check, run before a platform is connected.
    ///
    /// Another start may still win the race; [`SubscriptionGate::activate`],
    /// run once the platform is connected, is the authoritative check.
    pub async fn can_activate(&self, bot: &Bot) -> Result<Decision, BotFactoryError> {
        let tier = self.tier_for(&bot.owner).await?;
        let Some(limit) = self.limits.limits_for(tier).max_active_bots else {
            return Ok(Decision::Allowed);
        };
        let active = self
            .store
            .count_active_bots(&bot.owner, Some(&bot.id))
            .await?;
        if active >= limit {
            return Ok(self.deny_activation(bot, tier, limit));
        }
        Ok(Decision::Allowed)
    }

    /// Marks the bot ACTIVE if the owner's tier still has room.
    pub async fn activate(&self, bot: &Bot) -> Result<Decision, BotFactoryError> {
        let tier = self.tier_for(&bot.owner).await?;
        let limit = self.limits.limits_for(tier).max_active_bots;
        if self.store.activate_bot_within_limit(&bot.id, limit).await? {
            debug!(bot_id = %bot.id, %tier, "bot activation approved");
            return Ok(Decision::Allowed);
        }
        // `None` never fails activation, so the limit is known here.
        Ok(self.deny_activation(bot, tier, limit.unwrap_or_default()))
    }

    /// Consumes one message from the owner's quota for the current period.
    pub async fn can_process_message(&self, bot: &Bot) -> Result<Decision, BotFactoryError> {
        self.can_process_message_at(bot, Utc::now()).await
    }

    pub async fn can_process_message_at(
        &self,
        bot: &Bot,
        now: DateTime<Utc>,
    ) -> Result<Decision, BotFactoryError> {
        let tier = self.tier_for(&bot.owner).await?;
        let limit = self.limits.limits_for(tier).max_messages_per_period;
        let period = period_key(now);

        if !self
            .store
            .consume_message_quota(&bot.owner, &period, limit)
            .await?
        {
            metrics::counter!("botfactory_quota_denials_total", "kind" => "messages").increment(1);
            warn!(
                bot_id = %bot.id,
                owner = %bot.owner,
                %tier,
                period = %period,
                "message quota exhausted"
            );
            return Ok(Decision::Denied(format!(
                "{tier} tier allows {} messages per month",
                limit.unwrap_or_default()
            )));
        }

        if let Some(limit) = limit {
            let used = self.store.message_usage(&bot.owner, &period).await?;
            if used == (limit as f64 * WARN_RATIO).ceil() as u64 {
                warn!(
                    owner = %bot.owner,
                    used,
                    limit,
                    "message quota at {:.0}%",
                    WARN_RATIO * 100.0
                );
            }
        }
        Ok(Decision::Allowed)
    }

    fn deny_activation(&self, bot: &Bot, tier: Tier, limit: u32) -> Decision {
        metrics::counter!("botfactory_quota_denials_total", "kind" => "active_bots").increment(1);
        warn!(
            bot_id = %bot.id,
            owner = %bot.owner,
            %tier,
            limit,
            "active bot limit reached"
        );
        Decision::Denied(format!("{tier} tier allows {limit} active bot(s)"))
    }
}
