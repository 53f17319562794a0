// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriptions and per-period message counters.

use botfactory_core::{BotFactoryError, Subscription, UserId};
use rusqlite::{TransactionBehavior, params};

use super::{from_sql_int, to_sql_int};
use crate::database::{Database, enum_from_sql, map_tr_err, ts_from_sql, ts_to_sql};

pub async fn upsert_subscription(
    db: &Database,
    subscription: &Subscription,
) -> Result<(), BotFactoryError> {
    let sub = subscription.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO subscriptions (user_id, tier, period_start, active)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     tier = excluded.tier,
                     period_start = excluded.period_start,
                     active = excluded.active",
                params![
                    sub.user_id.0,
                    sub.tier.to_string(),
                    ts_to_sql(&sub.period_start),
                    sub.active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_subscription(
    db: &Database,
    user: &UserId,
) -> Result<Option<Subscription>, BotFactoryError> {
    let user = user.0.clone();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT user_id, tier, period_start, active FROM subscriptions WHERE user_id = ?1",
                params![user],
                |row| {
                    let tier: String = row.get(1)?;
                    let period_start: String = row.get(2)?;
                    Ok(Subscription {
                        user_id: UserId(row.get(0)?),
                        tier: enum_from_sql(1, &tier)?,
                        period_start: ts_from_sql(2, &period_start)?,
                        active: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(sub) => Ok(Some(sub)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Increments the counter only while it is below `limit`; the conditional
/// `UPDATE` makes check and increment one statement.
pub async fn consume_message_quota(
    db: &Database,
    user: &UserId,
    period: &str,
    limit: Option<u64>,
) -> Result<bool, BotFactoryError> {
    let user = user.0.clone();
    let period = period.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT OR IGNORE INTO message_usage (user_id, period, used) VALUES (?1, ?2, 0)",
                params![user, period],
            )?;
            let changed = match limit {
                Some(limit) => tx.execute(
                    "UPDATE message_usage SET used = used + 1
                     WHERE user_id = ?1 AND period = ?2 AND used < ?3",
                    params![user, period, to_sql_int(limit)],
                )?,
                None => tx.execute(
                    "UPDATE message_usage SET used = used + 1 WHERE user_id = ?1 AND period = ?2",
                    params![user, period],
                )?,
            };
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn message_usage(
    db: &Database,
    user: &UserId,
    period: &str,
) -> Result<u64, BotFactoryError> {
    let user = user.0.clone();
    let period = period.to_string();
    let used: Option<i64> = db
        .connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT used FROM message_usage WHERE user_id = ?1 AND period = ?2",
                params![user, period],
                |row| row.get(0),
            ) {
                Ok(used) => Ok(Some(used)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;
    Ok(used.map(from_sql_int).unwrap_or(0))
}
