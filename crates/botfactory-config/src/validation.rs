// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Covers constraints serde cannot express: non-zero timeouts, ordered
//! backoff bounds, monotonic tier quotas, usable paths and addresses.

use botfactory_core::Tier;

use crate::diagnostic::ConfigError;
use crate::model::{BotFactoryConfig, StorageBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &BotFactoryConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    validate_ai(config, &mut errors);
    validate_runtime(config, &mut errors);
    validate_tiers(config, &mut errors);

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty when storage.backend = \"sqlite\"",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }
    if config.gateway.enabled && config.gateway.port == 0 {
        errors.push(ConfigError::validation("gateway.port must not be 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_ai(config: &BotFactoryConfig, errors: &mut Vec<ConfigError>) {
    let ai = &config.ai;
    if ai.model.trim().is_empty() {
        errors.push(ConfigError::validation("ai.model must not be empty"));
    }
    if !(ai.base_url.starts_with("http://") || ai.base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "ai.base_url `{}` must start with http:// or https://",
            ai.base_url
        )));
    }
    if ai.request_timeout_secs == 0 {
        errors.push(ConfigError::validation("ai.request_timeout_secs must be greater than 0"));
    }
    if ai.max_output_tokens == 0 {
        errors.push(ConfigError::validation("ai.max_output_tokens must be greater than 0"));
    }
    if ai.backoff_initial_ms > ai.backoff_max_ms {
        errors.push(ConfigError::validation(format!(
            "ai.backoff_initial_ms ({}) must not exceed ai.backoff_max_ms ({})",
            ai.backoff_initial_ms, ai.backoff_max_ms
        )));
    }
}

fn validate_runtime(config: &BotFactoryConfig, errors: &mut Vec<ConfigError>) {
    let positive: [(&str, u64); 7] = [
        ("context.max_messages", config.context.max_messages as u64),
        ("context.max_tokens", u64::from(config.context.max_tokens)),
        (
            "worker.max_concurrent_conversations",
            config.worker.max_concurrent_conversations as u64,
        ),
        ("worker.lane_capacity", config.worker.lane_capacity as u64),
        ("worker.connect_timeout_secs", config.worker.connect_timeout_secs),
        ("supervisor.shutdown_timeout_secs", config.supervisor.shutdown_timeout_secs),
        ("analytics.queue_capacity", config.analytics.queue_capacity as u64),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
        }
    }

    let sup = &config.supervisor;
    if sup.restart_backoff_initial_ms > sup.restart_backoff_max_ms {
        errors.push(ConfigError::validation(format!(
            "supervisor.restart_backoff_initial_ms ({}) must not exceed \
             supervisor.restart_backoff_max_ms ({})",
            sup.restart_backoff_initial_ms, sup.restart_backoff_max_ms
        )));
    }

    let replies = &config.replies;
    for (key, text) in [
        ("replies.welcome", &replies.welcome),
        ("replies.fallback", &replies.fallback),
        ("replies.empty", &replies.empty),
        ("replies.quota_exceeded", &replies.quota_exceeded),
    ] {
        if text.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{key} must not be empty")));
        }
    }
}

/// Each tier must grant at least what the tier below it grants.
fn validate_tiers(config: &BotFactoryConfig, errors: &mut Vec<ConfigError>) {
    for pair in Tier::ALL.windows(2) {
        let (lower, higher) = (pair[0], pair[1]);
        let lower_limits = config.subscription.limits_for(lower);
        let higher_limits = config.subscription.limits_for(higher);
        if !higher_limits.covers(&lower_limits) {
            errors.push(ConfigError::validation(format!(
                "subscription.{} limits must be at least subscription.{} limits",
                higher.to_string().to_lowercase(),
                lower.to_string().to_lowercase()
            )));
        }
    }
}
