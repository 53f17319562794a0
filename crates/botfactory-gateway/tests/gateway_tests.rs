// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin API tests driving the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use botfactory_ai::AiResponder;
use botfactory_analytics::AnalyticsRecorder;
use botfactory_config::model::{
    AiConfig, ContextConfig, RepliesConfig, SubscriptionConfig, SupervisorConfig, WorkerConfig,
};
use botfactory_context::{ContextLimits, ConversationContextManager};
use botfactory_core::{Bot, BotId, BotStatus, Platform, Store};
use botfactory_gateway::{AuthConfig, GatewayState, HealthState, router};
use botfactory_storage::MemoryStore;
use botfactory_subscription::SubscriptionGate;
use botfactory_supervisor::{BotSupervisor, WorkerServices};
use botfactory_test_utils::{MockAdapterFactory, MockProvider};
use serde_json::Value;
use tower::ServiceExt;

const TOKEN: &str = "admin-secret";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    factory: Arc<MockAdapterFactory>,
}

fn test_app(bearer_token: Option<&str>, metrics: Option<&'static str>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();
    let factory = Arc::new(MockAdapterFactory::new());
    let context = ContextConfig::default();

    let services = Arc::new(WorkerServices {
        store: dyn_store.clone(),
        context: Arc::new(ConversationContextManager::new(ContextLimits::from(&context))),
        responder: Arc::new(AiResponder::new(
            Arc::new(MockProvider::new()),
            &AiConfig::default(),
            context.max_tokens,
        )),
        gate: Arc::new(SubscriptionGate::new(dyn_store, SubscriptionConfig::default())),
        analytics: AnalyticsRecorder::disabled(),
        worker: WorkerConfig::default(),
        replies: RepliesConfig::default(),
        hydrate_limit: context.hydrate_limit,
    });
    let supervisor = BotSupervisor::new(services, factory.clone(), SupervisorConfig::default());

    let state = GatewayState {
        supervisor,
        auth: AuthConfig {
            bearer_token: bearer_token.map(str::to_string),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render: metrics
                .map(|text| Arc::new(move || text.to_string()) as Arc<dyn Fn() -> String + Send + Sync>),
        },
    };
    TestApp {
        app: router(state),
        store,
        factory,
    }
}

async fn add_bot(app: &TestApp, id: &str) -> BotId {
    let bot = Bot::new(id, "owner", "Helper", Platform::Telegram);
    app.store.insert_bot(&bot).await.unwrap();
    bot.id
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app(None, None);
    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running_bots"], 0);
}

#[tokio::test]
async fn test_bot_routes_fail_closed_without_token() {
    let app = test_app(None, None);
    add_bot(&app, "b1").await;
    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/start").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(app.factory.created(), 0);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let app = test_app(Some(TOKEN), None);
    let request = Request::builder()
        .uri("/bots/b1/status")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/bots/b1/status")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_status_stop_cycle() {
    let app = test_app(Some(TOKEN), None);
    add_bot(&app, "b1").await;

    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/start").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["worker"], "running");

    let (status, body) = send(
        &app,
        authed("GET", "/bots/b1/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["restart_pending"], false);

    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/stop").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "INACTIVE");
    assert_eq!(body["worker"], Value::Null);
}

#[tokio::test]
async fn test_unknown_bot_is_404_with_code() {
    let app = test_app(Some(TOKEN), None);
    let (status, body) = send(
        &app,
        authed("GET", "/bots/ghost/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "bot_not_found");
    assert_eq!(body["error"], "bot not found: ghost");
}

#[tokio::test]
async fn test_second_bot_over_tier_limit_is_forbidden() {
    let app = test_app(Some(TOKEN), None);
    add_bot(&app, "b1").await;
    let second = add_bot(&app, "b2").await;

    let (status, _) = send(
        &app,
        authed("POST", "/bots/b1/start").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app,
        authed("POST", "/bots/b2/start").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "quota_exceeded");

    let bot = app.store.get_bot(&second).await.unwrap().unwrap();
    assert_eq!(bot.status, BotStatus::Pending);
}

#[tokio::test]
async fn test_delete_requires_inactive() {
    let app = test_app(Some(TOKEN), None);
    let id = add_bot(&app, "b1").await;

    let (status, body) = send(&app, authed("DELETE", "/bots/b1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");

    app.store
        .set_bot_status(&id, BotStatus::Inactive)
        .await
        .unwrap();
    let (status, _) = send(&app, authed("DELETE", "/bots/b1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.store.get_bot(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_broadcast_validates_body_and_state() {
    let app = test_app(Some(TOKEN), None);
    add_bot(&app, "b1").await;

    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/broadcast")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text": "  "}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/broadcast")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text": "News"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");
}

#[tokio::test]
async fn test_broadcast_to_running_bot() {
    let app = test_app(Some(TOKEN), None);
    let id = add_bot(&app, "b1").await;
    send(
        &app,
        authed("POST", "/bots/b1/start").body(Body::empty()).unwrap(),
    )
    .await;
    let platform = app.factory.handle(&id);
    platform.inject_text("42", "hello").await;
    platform.wait_for_sent(1, Duration::from_secs(5)).await;

    let (status, body) = send(
        &app,
        authed("POST", "/bots/b1/broadcast")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text": "News"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_targets"], 1);
    assert_eq!(body["successful"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(platform.sent_to("42").await.last().unwrap(), "News");
}

#[tokio::test]
async fn test_analytics_query() {
    let app = test_app(Some(TOKEN), None);
    add_bot(&app, "b1").await;

    let (status, body) = send(
        &app,
        authed("GET", "/bots/b1/analytics?since=2026-01-01")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bot_id"], "b1");
    assert_eq!(body["since"], "2026-01-01");
    assert_eq!(body["summary"]["messages_processed"], 0);

    let (status, body) = send(
        &app,
        authed("GET", "/bots/b1/analytics?since=yesterday")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let disabled = test_app(Some(TOKEN), None);
    let (status, body) = send(
        &disabled,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "metrics_disabled");

    let enabled = test_app(Some(TOKEN), Some("botfactory_messages_total 3\n"));
    let (status, body) = send(
        &enabled,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("botfactory_messages_total 3\n".into()));
}
