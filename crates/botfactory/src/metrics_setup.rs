// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus recorder installation and metric descriptions.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Installs the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed; the process then runs
/// without metrics export.
pub fn install_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            info!("prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

fn describe_metrics() {
    describe_counter!("botfactory_messages_total", "Messages answered by the AI service");
    describe_counter!("botfactory_tokens_total", "Tokens consumed by replies");
    describe_counter!(
        "botfactory_conversations_started_total",
        "Conversations opened by new end-users"
    );
    describe_counter!("botfactory_ai_errors_total", "Failed completion attempts by kind");
    describe_counter!("botfactory_ai_retries_total", "Completion attempts retried");
    describe_counter!(
        "botfactory_quota_denials_total",
        "Actions refused by subscription limits"
    );
    describe_counter!("botfactory_delivery_failures_total", "Replies the platform did not accept");
    describe_counter!("botfactory_connect_failures_total", "Failed platform connections");
    describe_counter!("botfactory_worker_faults_total", "Workers ended by an adapter fault");
    describe_counter!("botfactory_worker_restarts_total", "Automatic worker restarts");
    describe_counter!(
        "botfactory_context_evictions_total",
        "Messages evicted from context windows"
    );
    describe_counter!(
        "botfactory_analytics_dropped_total",
        "Usage events dropped because the queue was full"
    );
    describe_counter!(
        "botfactory_analytics_write_errors_total",
        "Usage events the store failed to persist"
    );
    describe_gauge!("botfactory_active_workers", "Workers currently running");
    describe_histogram!(
        "botfactory_response_latency_seconds",
        "Time to produce a reply, including retries"
    );
}
