// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message history, ordered by a per-conversation sequence number.

use botfactory_core::{BotFactoryError, ConversationId, Message, MessageId, NewMessage};
use rusqlite::{Row, TransactionBehavior, params};

use super::{from_sql_int, to_sql_int};
use crate::database::{Database, enum_from_sql, map_tr_err, ts_from_sql, ts_to_sql};

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let timestamp: String = row.get(4)?;
    let token_count: Option<i64> = row.get(5)?;
    let latency_ms: Option<i64> = row.get(6)?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        role: enum_from_sql(2, &role)?,
        content: row.get(3)?,
        timestamp: ts_from_sql(4, &timestamp)?,
        token_count: token_count.map(|t| u32::try_from(t).unwrap_or(u32::MAX)),
        latency_ms: latency_ms.map(from_sql_int),
    })
}

/// Inserts the message after the conversation's latest one and bumps the
/// conversation counters, all in one transaction.
pub async fn append_message(db: &Database, message: NewMessage) -> Result<Message, BotFactoryError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let last_message_at: Option<String> = tx.query_row(
                "SELECT last_message_at FROM conversations WHERE id = ?1",
                params![message.conversation_id.0],
                |row| row.get(0),
            )?;
            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
                params![message.conversation_id.0],
                |row| row.get(0),
            )?;

            let mut timestamp = message.timestamp;
            if let Some(last) = last_message_at {
                let last = ts_from_sql(0, &last)?;
                if timestamp < last {
                    timestamp = last;
                }
            }

            let recorded = Message {
                id: MessageId(uuid::Uuid::new_v4().to_string()),
                conversation_id: message.conversation_id,
                role: message.role,
                content: message.content,
                timestamp,
                token_count: message.token_count,
                latency_ms: message.latency_ms,
            };
            tx.execute(
                "INSERT INTO messages (id, conversation_id, seq, role, content, timestamp,
                                       token_count, latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    recorded.id.0,
                    recorded.conversation_id.0,
                    next_seq,
                    recorded.role.to_string(),
                    recorded.content,
                    ts_to_sql(&recorded.timestamp),
                    recorded.token_count.map(i64::from),
                    recorded.latency_ms.map(to_sql_int),
                ],
            )?;
            tx.execute(
                "UPDATE conversations
                 SET message_count = message_count + 1, last_message_at = ?2
                 WHERE id = ?1",
                params![recorded.conversation_id.0, ts_to_sql(&recorded.timestamp)],
            )?;
            tx.commit()?;
            Ok(recorded)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn recent_messages(
    db: &Database,
    conversation: &ConversationId,
    limit: usize,
) -> Result<Vec<Message>, BotFactoryError> {
    let conversation = conversation.0.clone();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut messages = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, timestamp, token_count, latency_ms
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![conversation, limit], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;
    messages.reverse();
    Ok(messages)
}
