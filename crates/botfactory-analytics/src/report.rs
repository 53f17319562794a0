// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read side of the analytics buckets.

use botfactory_core::{BotAnalytics, BotFactoryError, BotId, Store};
use chrono::NaiveDate;
use serde::Serialize;

/// Totals over a range of daily buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub days: usize,
    pub messages_processed: u64,
    pub tokens_consumed: u64,
    pub new_conversations: u64,
    /// Mean response latency over all processed messages.
    pub avg_latency_ms: f64,
}

impl AnalyticsSummary {
    pub fn from_buckets(buckets: &[BotAnalytics]) -> Self {
        let messages_processed = buckets.iter().map(|b| b.messages_processed).sum::<u64>();
        let total_latency_ms = buckets.iter().map(|b| b.total_latency_ms).sum::<u64>();
        Self {
            days: buckets.len(),
            messages_processed,
            tokens_consumed: buckets.iter().map(|b| b.tokens_consumed).sum(),
            new_conversations: buckets.iter().map(|b| b.new_conversations).sum(),
            avg_latency_ms: if messages_processed == 0 {
                0.0
            } else {
                total_latency_ms as f64 / messages_processed as f64
            },
        }
    }
}

/// Daily buckets of one bot plus their totals.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub bot_id: BotId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    pub daily: Vec<BotAnalytics>,
    pub summary: AnalyticsSummary,
}

impl AnalyticsReport {
    /// Loads the buckets of `bot_id` from `since` (inclusive) onwards.
    pub async fn load(
        store: &dyn Store,
        bot_id: &BotId,
        since: Option<NaiveDate>,
    ) -> Result<Self, BotFactoryError> {
        let daily = store.analytics(bot_id, since).await?;
        Ok(Self {
            bot_id: bot_id.clone(),
            since,
            summary: AnalyticsSummary::from_buckets(&daily),
            daily,
        })
    }
}
