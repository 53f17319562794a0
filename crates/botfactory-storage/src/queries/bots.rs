// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot records and the atomic activation check.

use botfactory_core::{Bot, BotFactoryError, BotId, BotStatus, PlatformCredentials, UserId};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Row, TransactionBehavior, params};

use crate::database::{Database, enum_from_sql, map_tr_err, ts_from_sql, ts_to_sql};

const BOT_COLUMNS: &str = "id, owner_id, name, platform, personality, instructions, status, \
                           credentials, created_at, last_active";

fn bot_from_row(row: &Row<'_>) -> rusqlite::Result<Bot> {
    let platform: String = row.get(3)?;
    let status: String = row.get(6)?;
    let credentials: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    let last_active: Option<String> = row.get(9)?;
    Ok(Bot {
        id: BotId(row.get(0)?),
        owner: UserId(row.get(1)?),
        name: row.get(2)?,
        platform: enum_from_sql(3, &platform)?,
        personality: row.get(4)?,
        instructions: row.get(5)?,
        status: enum_from_sql(6, &status)?,
        credentials: serde_json::from_str::<PlatformCredentials>(&credentials).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
        })?,
        created_at: ts_from_sql(8, &created_at)?,
        last_active: last_active
            .map(|value| ts_from_sql(9, &value))
            .transpose()?,
    })
}

pub async fn insert_bot(db: &Database, bot: &Bot) -> Result<(), BotFactoryError> {
    let credentials =
        serde_json::to_string(&bot.credentials).map_err(BotFactoryError::persistence)?;
    let bot = bot.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bots (id, owner_id, name, platform, personality, instructions,
                                   status, credentials, created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    bot.id.0,
                    bot.owner.0,
                    bot.name,
                    bot.platform.to_string(),
                    bot.personality,
                    bot.instructions,
                    bot.status.to_string(),
                    credentials,
                    ts_to_sql(&bot.created_at),
                    bot.last_active.as_ref().map(ts_to_sql),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_bot(db: &Database, id: &BotId) -> Result<Option<Bot>, BotFactoryError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = ?1"))?;
            match stmt.query_row(params![id], bot_from_row) {
                Ok(bot) => Ok(Some(bot)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_bots(
    db: &Database,
    status: Option<BotStatus>,
) -> Result<Vec<Bot>, BotFactoryError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOT_COLUMNS} FROM bots
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map(params![status], bot_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_bot_status(
    db: &Database,
    id: &BotId,
    status: BotStatus,
) -> Result<(), BotFactoryError> {
    let key = id.0.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET status = ?2 WHERE id = ?1",
                params![key, status.to_string()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(BotFactoryError::BotNotFound(id.clone()));
    }
    Ok(())
}

pub async fn activate_bot_within_limit(
    db: &Database,
    id: &BotId,
    max_active: Option<u32>,
) -> Result<bool, BotFactoryError> {
    let key = id.0.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let owner = match tx.query_row(
                "SELECT owner_id FROM bots WHERE id = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            ) {
                Ok(owner) => owner,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e),
            };
            if let Some(limit) = max_active {
                let active: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM bots WHERE owner_id = ?1 AND status = ?2 AND id != ?3",
                    params![owner, BotStatus::Active.to_string(), key],
                    |row| row.get(0),
                )?;
                if active >= i64::from(limit) {
                    return Ok(Some(false));
                }
            }
            tx.execute(
                "UPDATE bots SET status = ?2 WHERE id = ?1",
                params![key, BotStatus::Active.to_string()],
            )?;
            tx.commit()?;
            Ok(Some(true))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.ok_or_else(|| BotFactoryError::BotNotFound(id.clone()))
}

pub async fn count_active_bots(
    db: &Database,
    owner: &UserId,
    excluding: Option<&BotId>,
) -> Result<u32, BotFactoryError> {
    let owner = owner.0.clone();
    let excluding = excluding.map(|id| id.0.clone());
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM bots
                 WHERE owner_id = ?1 AND status = ?2 AND (?3 IS NULL OR id != ?3)",
                params![owner, BotStatus::Active.to_string(), excluding],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub async fn touch_bot(db: &Database, id: &BotId, at: DateTime<Utc>) -> Result<(), BotFactoryError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bots SET last_active = ?2 WHERE id = ?1",
                params![id, ts_to_sql(&at)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations and messages go with the bot through `ON DELETE CASCADE`;
/// analytics buckets have no foreign key and are removed explicitly.
pub async fn delete_bot(db: &Database, id: &BotId) -> Result<(), BotFactoryError> {
    let key = id.0.clone();
    let deleted = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM bot_analytics WHERE bot_id = ?1", params![key])?;
            let deleted = tx.execute("DELETE FROM bots WHERE id = ?1", params![key])?;
            tx.commit()?;
            Ok(deleted)
        })
        .await
        .map_err(map_tr_err)?;
    if deleted == 0 {
        return Err(BotFactoryError::BotNotFound(id.clone()));
    }
    Ok(())
}
