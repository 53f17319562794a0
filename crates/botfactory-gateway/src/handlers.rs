// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the admin API.
//!
//! Bot routes return the supervisor's reports as JSON; failures are mapped
//! to [`ApiError`] bodies.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use botfactory_analytics::AnalyticsReport;
use botfactory_core::BotId;
use botfactory_supervisor::{BotStatusReport, BroadcastReport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Query string of `GET /bots/{id}/analytics`.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// First day to include, as `YYYY-MM-DD`.
    #[serde(default)]
    pub since: Option<String>,
}

/// Request body for `POST /bots/{id}/broadcast`.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub text: String,
    /// External user ids to reach. All conversations when omitted.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub running_bots: usize,
}

/// POST /bots/{id}/start
pub async fn start_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotStatusReport>, ApiError> {
    let report = state.supervisor.start(&BotId::from(id)).await?;
    Ok(Json(report))
}

/// POST /bots/{id}/stop
pub async fn stop_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotStatusReport>, ApiError> {
    let report = state.supervisor.stop(&BotId::from(id)).await?;
    Ok(Json(report))
}

/// POST /bots/{id}/restart
pub async fn restart_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotStatusReport>, ApiError> {
    let report = state.supervisor.restart(&BotId::from(id)).await?;
    Ok(Json(report))
}

/// GET /bots/{id}/status
pub async fn get_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotStatusReport>, ApiError> {
    let report = state.supervisor.status(&BotId::from(id)).await?;
    Ok(Json(report))
}

/// DELETE /bots/{id}
///
/// Only INACTIVE bots can be deleted.
pub async fn delete_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.supervisor.delete(&BotId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /bots/{id}/analytics?since=YYYY-MM-DD
pub async fn get_analytics(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let since = query
        .since
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request(format!("invalid date '{raw}', expected YYYY-MM-DD")))
        })
        .transpose()?;
    let report = state.supervisor.analytics(&BotId::from(id), since).await?;
    Ok(Json(report))
}

/// POST /bots/{id}/broadcast
pub async fn broadcast(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::bad_request("broadcast text must not be empty"));
    }
    let report = state
        .supervisor
        .broadcast(&BotId::from(id), &body.text, body.targets.as_deref())
        .await?;
    Ok(Json(report))
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        running_bots: state.supervisor.running(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when the exporter is disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError {
            status: StatusCode::NOT_FOUND,
            code: "metrics_disabled",
            message: "prometheus exporter is disabled".to_string(),
        }
        .into_response(),
    }
}
