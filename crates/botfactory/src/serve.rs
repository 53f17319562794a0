// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `botfactory serve` implementation.
//!
//! Wires storage, the AI provider, analytics and the supervisor together,
//! then serves the admin gateway until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Instant;

use botfactory_ai::AiResponder;
use botfactory_analytics::AnalyticsRecorder;
use botfactory_config::BotFactoryConfig;
use botfactory_context::{ContextLimits, ConversationContextManager};
use botfactory_core::{BotFactoryError, CompletionProvider, HealthStatus, PluginAdapter};
use botfactory_gateway::{AuthConfig, GatewayState, HealthState};
use botfactory_gemini::GeminiProvider;
use botfactory_subscription::SubscriptionGate;
use botfactory_supervisor::{BotSupervisor, WorkerServices, install_signal_handler};
use tracing::{error, info, warn};

use crate::metrics_setup;
use crate::platforms::DefaultPlatformFactory;

/// Runs the service until SIGTERM or Ctrl+C.
pub async fn run_serve(config: BotFactoryConfig) -> Result<(), BotFactoryError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, version = env!("CARGO_PKG_VERSION"), "starting botfactory");

    let prometheus = if config.prometheus.enabled {
        metrics_setup::install_prometheus()
    } else {
        None
    };

    let store = botfactory_storage::open_store(&config.storage).await?;

    let provider = Arc::new(GeminiProvider::new(&config.ai)?);
    match provider.health_check().await {
        Ok(HealthStatus::Healthy) => info!("AI provider reachable"),
        Ok(HealthStatus::Degraded(reason)) => warn!(reason = %reason, "AI provider degraded"),
        Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(reason = %reason, "AI provider unhealthy, replies will fall back")
        }
        Err(e) => warn!(error = %e, "AI provider health check failed"),
    }
    let provider: Arc<dyn CompletionProvider> = provider;

    let (analytics, analytics_writer) =
        AnalyticsRecorder::spawn(Arc::clone(&store), &config.analytics);

    let services = Arc::new(WorkerServices {
        store: Arc::clone(&store),
        context: Arc::new(ConversationContextManager::new(ContextLimits::from(
            &config.context,
        ))),
        responder: Arc::new(AiResponder::new(
            provider,
            &config.ai,
            config.context.max_tokens,
        )),
        gate: Arc::new(SubscriptionGate::new(
            Arc::clone(&store),
            config.subscription.clone(),
        )),
        analytics,
        worker: config.worker.clone(),
        replies: config.replies.clone(),
        hydrate_limit: config.context.hydrate_limit,
    });
    let supervisor = BotSupervisor::new(
        services,
        Arc::new(DefaultPlatformFactory),
        config.supervisor.clone(),
    );

    if config.supervisor.resume_on_startup {
        match supervisor.resume().await {
            Ok(started) => info!(started, "resumed active bots"),
            Err(e) => error!(error = %e, "failed to resume active bots"),
        }
    }

    let cancel = install_signal_handler();

    let gateway = if config.gateway.enabled {
        let state = GatewayState {
            supervisor: Arc::clone(&supervisor),
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState {
                start_time: Instant::now(),
                prometheus_render: prometheus.map(|handle| {
                    Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
                }),
            },
        };
        let gateway_config = config.gateway.clone();
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = botfactory_gateway::serve(&gateway_config, state, gateway_cancel.clone()).await {
                error!(error = %e, "gateway failed, shutting down");
                gateway_cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;
    info!("shutdown requested");

    supervisor.shutdown().await;
    if let Some(gateway) = gateway
        && let Err(e) = gateway.await
    {
        warn!(error = %e, "gateway task ended abnormally");
    }
    // The writer drains once every recorder clone, including the one held
    // by the worker services, has been dropped.
    drop(supervisor);
    analytics_writer
        .finish(config.supervisor.shutdown_timeout())
        .await;

    store.close().await?;
    info!("botfactory stopped");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `log_level` and
/// everything else at `warn`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("botfactory={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
