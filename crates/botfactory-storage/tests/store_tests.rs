// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioral tests run against every store backend.

use std::sync::Arc;

use botfactory_config::model::StorageConfig;
use botfactory_core::{
    Bot, BotFactoryError, BotId, BotStatus, NewMessage, Platform, Role, Store, Subscription, Tier,
    UsageDelta, UserId,
};
use botfactory_storage::{MemoryStore, SqliteStore};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

async fn sqlite() -> (Arc<dyn Store>, Option<TempDir>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let store = SqliteStore::new(StorageConfig {
        database_path: path.to_str().unwrap().to_string(),
        ..StorageConfig::default()
    });
    store.initialize().await.unwrap();
    (Arc::new(store), Some(dir))
}

async fn memory() -> (Arc<dyn Store>, Option<TempDir>) {
    (Arc::new(MemoryStore::new()), None)
}

/// Runs the scenario once per backend.
macro_rules! store_test {
    ($name:ident, $body:ident) => {
        mod $name {
            use super::*;

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn sqlite_backend() {
                let (store, _dir) = sqlite().await;
                $body(store).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn memory_backend() {
                let (store, _dir) = memory().await;
                $body(store).await;
            }
        }
    };
}

async fn add_bot(store: &Arc<dyn Store>, id: &str, owner: &str) -> Bot {
    let bot = Bot::new(id, owner, format!("bot {id}"), Platform::Telegram);
    store.insert_bot(&bot).await.unwrap();
    bot
}

async fn bot_records(store: Arc<dyn Store>) {
    let mut bot = Bot::new("b1", "u1", "Helper", Platform::Telegram);
    bot.instructions = Some("Be brief.".into());
    bot.credentials = botfactory_core::PlatformCredentials::with_token("123:abc");
    store.insert_bot(&bot).await.unwrap();
    add_bot(&store, "b2", "u1").await;

    let loaded = store.get_bot(&bot.id).await.unwrap().unwrap();
    assert_eq!(loaded.instructions.as_deref(), Some("Be brief."));
    assert_eq!(loaded.credentials.token.as_deref(), Some("123:abc"));
    assert_eq!(loaded.status, BotStatus::Pending);
    assert!(store.get_bot(&BotId::from("missing")).await.unwrap().is_none());

    assert!(store.insert_bot(&bot).await.is_err(), "duplicate id must fail");

    store.set_bot_status(&bot.id, BotStatus::Inactive).await.unwrap();
    let inactive = store.list_bots(Some(BotStatus::Inactive)).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].id, bot.id);
    assert_eq!(store.list_bots(None).await.unwrap().len(), 2);

    let err = store
        .set_bot_status(&BotId::from("missing"), BotStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, BotFactoryError::BotNotFound(_)));

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    store.touch_bot(&bot.id, at).await.unwrap();
    assert_eq!(store.get_bot(&bot.id).await.unwrap().unwrap().last_active, Some(at));
}
store_test!(bot_crud, bot_records);

async fn activation_respects_owner_limit(store: Arc<dyn Store>) {
    let first = add_bot(&store, "b1", "u1").await;
    let second = add_bot(&store, "b2", "u1").await;
    let other_owner = add_bot(&store, "b3", "u2").await;

    assert!(store.activate_bot_within_limit(&first.id, Some(1)).await.unwrap());
    assert!(!store.activate_bot_within_limit(&second.id, Some(1)).await.unwrap());
    assert_eq!(
        store.get_bot(&second.id).await.unwrap().unwrap().status,
        BotStatus::Pending
    );

    // Already active bots are not counted against themselves.
    assert!(store.activate_bot_within_limit(&first.id, Some(1)).await.unwrap());
    assert!(store.activate_bot_within_limit(&other_owner.id, Some(1)).await.unwrap());
    assert!(store.activate_bot_within_limit(&second.id, None).await.unwrap());

    // A lowered limit is enforced for bots that are already active.
    assert!(!store.activate_bot_within_limit(&first.id, Some(1)).await.unwrap());
    assert_eq!(
        store.get_bot(&first.id).await.unwrap().unwrap().status,
        BotStatus::Active
    );

    assert_eq!(
        store
            .count_active_bots(&UserId::from("u1"), None)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        store.count_active_bots(&UserId::from("u1"), Some(&first.id)).await.unwrap(),
        1
    );

    let err = store
        .activate_bot_within_limit(&BotId::from("missing"), Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, BotFactoryError::BotNotFound(_)));
}
store_test!(activation_limit, activation_respects_owner_limit);

async fn concurrent_activation_never_exceeds_limit(store: Arc<dyn Store>) {
    for i in 0..10 {
        add_bot(&store, &format!("b{i}"), "u1").await;
    }
    let attempts = (0..10).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .activate_bot_within_limit(&BotId(format!("b{i}")), Some(3))
                .await
                .unwrap()
        })
    });
    let results = futures::future::join_all(attempts).await;
    let activated = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(activated, 3);
    assert_eq!(store.list_bots(Some(BotStatus::Active)).await.unwrap().len(), 3);
}
store_test!(concurrent_activation, concurrent_activation_never_exceeds_limit);

async fn message_quota_is_consumed_up_to_limit(store: Arc<dyn Store>) {
    let user = UserId::from("u1");
    assert!(store.consume_message_quota(&user, "2026-03", Some(2)).await.unwrap());
    assert!(store.consume_message_quota(&user, "2026-03", Some(2)).await.unwrap());
    assert!(!store.consume_message_quota(&user, "2026-03", Some(2)).await.unwrap());
    assert_eq!(store.message_usage(&user, "2026-03").await.unwrap(), 2);

    // A new period starts from zero.
    assert!(store.consume_message_quota(&user, "2026-04", Some(2)).await.unwrap());
    assert_eq!(store.message_usage(&user, "2026-04").await.unwrap(), 1);

    for _ in 0..5 {
        assert!(store.consume_message_quota(&user, "2026-05", None).await.unwrap());
    }
    assert_eq!(store.message_usage(&user, "2026-05").await.unwrap(), 5);
    assert_eq!(store.message_usage(&UserId::from("nobody"), "2026-05").await.unwrap(), 0);
}
store_test!(message_quota, message_quota_is_consumed_up_to_limit);

async fn concurrent_quota_consumption_is_exact(store: Arc<dyn Store>) {
    let attempts = (0..50).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .consume_message_quota(&UserId::from("u1"), "2026-03", Some(20))
                .await
                .unwrap()
        })
    });
    let granted = futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();
    assert_eq!(granted, 20);
    assert_eq!(
        store.message_usage(&UserId::from("u1"), "2026-03").await.unwrap(),
        20
    );
}
store_test!(concurrent_quota, concurrent_quota_consumption_is_exact);

async fn subscriptions_upsert(store: Arc<dyn Store>) {
    let user = UserId::from("u1");
    assert!(store.get_subscription(&user).await.unwrap().is_none());
    let mut sub = Subscription {
        user_id: user.clone(),
        tier: Tier::Starter,
        period_start: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        active: true,
    };
    store.upsert_subscription(&sub).await.unwrap();
    sub.tier = Tier::Premium;
    sub.active = false;
    store.upsert_subscription(&sub).await.unwrap();
    assert_eq!(store.get_subscription(&user).await.unwrap(), Some(sub));
}
store_test!(subscriptions, subscriptions_upsert);

async fn conversations_and_messages(store: Arc<dyn Store>) {
    let bot = add_bot(&store, "b1", "u1").await;
    let (conversation, created) = store.conversation_for(&bot.id, "chat-42").await.unwrap();
    assert!(created);
    let (again, created) = store.conversation_for(&bot.id, "chat-42").await.unwrap();
    assert!(!created);
    assert_eq!(again.id, conversation.id);

    let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let first = store
        .append_message(
            NewMessage::new(conversation.id.clone(), Role::User, "hi", base + Duration::seconds(10))
                .with_tokens(1),
        )
        .await
        .unwrap();
    // Older than the previous message: raised to keep history ordered.
    let second = store
        .append_message(NewMessage::new(
            conversation.id.clone(),
            Role::Assistant,
            "hello",
            base,
        ))
        .await
        .unwrap();
    assert_eq!(second.timestamp, first.timestamp);
    store
        .append_message(NewMessage::new(
            conversation.id.clone(),
            Role::User,
            "how are you",
            base + Duration::seconds(20),
        ))
        .await
        .unwrap();

    let recent = store.recent_messages(&conversation.id, 2).await.unwrap();
    let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "how are you"]);
    assert_eq!(store.recent_messages(&conversation.id, 10).await.unwrap().len(), 3);
    assert_eq!(store.recent_messages(&conversation.id, 10).await.unwrap()[0].token_count, Some(1));

    let listed = store.list_conversations(&bot.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].message_count, 3);
    assert_eq!(listed[0].last_message_at, Some(base + Duration::seconds(20)));
}
store_test!(conversation_history, conversations_and_messages);

async fn concurrent_appends_keep_every_message(store: Arc<dyn Store>) {
    let bot = add_bot(&store, "b1", "u1").await;
    let (conversation, _) = store.conversation_for(&bot.id, "chat").await.unwrap();
    let appends = (0..40).map(|i| {
        let store = Arc::clone(&store);
        let id = conversation.id.clone();
        tokio::spawn(async move {
            store
                .append_message(NewMessage::new(id, Role::User, format!("m{i}"), Utc::now()))
                .await
                .unwrap()
        })
    });
    futures::future::join_all(appends).await;
    let history = store.recent_messages(&conversation.id, 100).await.unwrap();
    assert_eq!(history.len(), 40);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
store_test!(concurrent_appends, concurrent_appends_keep_every_message);

async fn analytics_accumulate_per_day(store: Arc<dyn Store>) {
    let bot = add_bot(&store, "b1", "u1").await;
    let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let delta = |bucket, new_conversations| UsageDelta {
        bot_id: bot.id.clone(),
        bucket,
        messages: 1,
        tokens: 30,
        latency_ms: 200,
        new_conversations,
    };
    store.record_usage(&delta(day1, 1)).await.unwrap();
    store.record_usage(&delta(day1, 0)).await.unwrap();
    store.record_usage(&delta(day2, 0)).await.unwrap();

    let all = store.analytics(&bot.id, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].bucket, day1);
    assert_eq!(all[0].messages_processed, 2);
    assert_eq!(all[0].tokens_consumed, 60);
    assert_eq!(all[0].new_conversations, 1);
    assert_eq!(all[0].avg_latency_ms(), 200.0);

    let recent = store.analytics(&bot.id, Some(day2)).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].bucket, day2);
}
store_test!(analytics, analytics_accumulate_per_day);

async fn delete_removes_dependent_records(store: Arc<dyn Store>) {
    let bot = add_bot(&store, "b1", "u1").await;
    let keep = add_bot(&store, "b2", "u1").await;
    let (conversation, _) = store.conversation_for(&bot.id, "chat").await.unwrap();
    store
        .append_message(NewMessage::new(conversation.id.clone(), Role::User, "hi", Utc::now()))
        .await
        .unwrap();
    store
        .record_usage(&UsageDelta {
            bot_id: bot.id.clone(),
            bucket: Utc::now().date_naive(),
            messages: 1,
            tokens: 1,
            latency_ms: 1,
            new_conversations: 1,
        })
        .await
        .unwrap();
    store.conversation_for(&keep.id, "chat").await.unwrap();

    store.delete_bot(&bot.id).await.unwrap();

    assert!(store.get_bot(&bot.id).await.unwrap().is_none());
    assert!(store.list_conversations(&bot.id).await.unwrap().is_empty());
    assert!(store.recent_messages(&conversation.id, 10).await.unwrap().is_empty());
    assert!(store.analytics(&bot.id, None).await.unwrap().is_empty());
    assert_eq!(store.list_conversations(&keep.id).await.unwrap().len(), 1);

    let err = store.delete_bot(&bot.id).await.unwrap_err();
    assert!(matches!(err, BotFactoryError::BotNotFound(_)));
}
store_test!(delete_cascade, delete_removes_dependent_records);
