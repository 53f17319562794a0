// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily analytics buckets.

use botfactory_core::{BotAnalytics, BotFactoryError, BotId, UsageDelta};
use chrono::NaiveDate;
use rusqlite::params;

use super::{from_sql_int, to_sql_int};
use crate::database::{Database, date_from_sql, date_to_sql, map_tr_err};

pub async fn record_usage(db: &Database, delta: &UsageDelta) -> Result<(), BotFactoryError> {
    let delta = delta.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bot_analytics
                     (bot_id, bucket, messages_processed, tokens_consumed, total_latency_ms,
                      new_conversations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(bot_id, bucket) DO UPDATE SET
                     messages_processed = messages_processed + excluded.messages_processed,
                     tokens_consumed = tokens_consumed + excluded.tokens_consumed,
                     total_latency_ms = total_latency_ms + excluded.total_latency_ms,
                     new_conversations = new_conversations + excluded.new_conversations",
                params![
                    delta.bot_id.0,
                    date_to_sql(&delta.bucket),
                    to_sql_int(delta.messages),
                    to_sql_int(delta.tokens),
                    to_sql_int(delta.latency_ms),
                    to_sql_int(delta.new_conversations),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn analytics(
    db: &Database,
    bot: &BotId,
    since: Option<NaiveDate>,
) -> Result<Vec<BotAnalytics>, BotFactoryError> {
    let bot = bot.0.clone();
    let since = since.as_ref().map(date_to_sql);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT bot_id, bucket, messages_processed, tokens_consumed, total_latency_ms,
                        new_conversations
                 FROM bot_analytics
                 WHERE bot_id = ?1 AND (?2 IS NULL OR bucket >= ?2)
                 ORDER BY bucket",
            )?;
            let rows = stmt.query_map(params![bot, since], |row| {
                let bucket: String = row.get(1)?;
                Ok(BotAnalytics {
                    bot_id: BotId(row.get(0)?),
                    bucket: date_from_sql(1, &bucket)?,
                    messages_processed: from_sql_int(row.get(2)?),
                    tokens_consumed: from_sql_int(row.get(3)?),
                    total_latency_ms: from_sql_int(row.get(4)?),
                    new_conversations: from_sql_int(row.get(5)?),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
