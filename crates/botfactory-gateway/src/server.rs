// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the admin API.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use botfactory_config::model::GatewayConfig;
use botfactory_core::BotFactoryError;
use botfactory_supervisor::BotSupervisor;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Renders the Prometheus exposition when the exporter is enabled.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub supervisor: Arc<BotSupervisor>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Builds the admin router.
///
/// - `GET /health`, `GET /metrics` (public)
/// - `POST /bots/{id}/start|stop|restart|broadcast` (bearer auth)
/// - `GET /bots/{id}/status|analytics` (bearer auth)
/// - `DELETE /bots/{id}` (bearer auth)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let bot_routes = Router::new()
        .route("/bots/{id}", delete(handlers::delete_bot))
        .route("/bots/{id}/start", post(handlers::start_bot))
        .route("/bots/{id}/stop", post(handlers::stop_bot))
        .route("/bots/{id}/restart", post(handlers::restart_bot))
        .route("/bots/{id}/status", get(handlers::get_status))
        .route("/bots/{id}/analytics", get(handlers::get_analytics))
        .route("/bots/{id}/broadcast", post(handlers::broadcast))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(bot_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serves the admin API until `shutdown` is cancelled.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), BotFactoryError> {
    if state.auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set, bot routes will reject every request");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BotFactoryError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| BotFactoryError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
