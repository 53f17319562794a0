// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup and creation.

use botfactory_core::{BotFactoryError, BotId, Conversation, ConversationId};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use super::from_sql_int;
use crate::database::{Database, map_tr_err, ts_from_sql, ts_to_sql};

const CONVERSATION_COLUMNS: &str =
    "id, bot_id, external_user_id, started_at, last_message_at, message_count";

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let started_at: String = row.get(3)?;
    let last_message_at: Option<String> = row.get(4)?;
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        bot_id: BotId(row.get(1)?),
        external_user_id: row.get(2)?,
        started_at: ts_from_sql(3, &started_at)?,
        last_message_at: last_message_at
            .map(|value| ts_from_sql(4, &value))
            .transpose()?,
        message_count: from_sql_int(row.get(5)?),
    })
}

/// Returns the existing conversation or creates it; the boolean is `true`
/// when this call created it.
pub async fn conversation_for(
    db: &Database,
    bot: &BotId,
    external_user_id: &str,
) -> Result<(Conversation, bool), BotFactoryError> {
    let bot = bot.0.clone();
    let external_user_id = external_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = tx
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE bot_id = ?1 AND external_user_id = ?2"
                    ),
                    params![bot, external_user_id],
                    conversation_from_row,
                )
                .optional()?;
            if let Some(conversation) = existing {
                return Ok((conversation, false));
            }

            let conversation = Conversation {
                id: ConversationId(uuid::Uuid::new_v4().to_string()),
                bot_id: BotId(bot),
                external_user_id,
                started_at: Utc::now(),
                last_message_at: None,
                message_count: 0,
            };
            tx.execute(
                "INSERT INTO conversations (id, bot_id, external_user_id, started_at, message_count)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![
                    conversation.id.0,
                    conversation.bot_id.0,
                    conversation.external_user_id,
                    ts_to_sql(&conversation.started_at),
                ],
            )?;
            tx.commit()?;
            Ok((conversation, true))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_conversations(
    db: &Database,
    bot: &BotId,
) -> Result<Vec<Conversation>, BotFactoryError> {
    let bot = bot.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE bot_id = ?1 ORDER BY started_at, id"
            ))?;
            let rows = stmt.query_map(params![bot], conversation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
