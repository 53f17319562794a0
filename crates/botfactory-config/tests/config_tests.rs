// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use botfactory_config::diagnostic::ConfigError;
use botfactory_config::model::StorageBackend;
use botfactory_config::{load_and_validate_str, load_config_from_str, to_toml};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "factory-eu"
log_level = "debug"

[ai]
api_key = "g-123"
model = "gemini-2.5-pro"
max_retries = 3
backoff_initial_ms = 100
backoff_max_ms = 400

[context]
max_messages = 10
max_tokens = 2000

[worker]
max_concurrent_conversations = 4
handle_start_command = false

[replies]
quota_exceeded = "Out of messages."

[supervisor]
shutdown_timeout_secs = 5
max_restart_attempts = 2

[subscription.free]
max_active_bots = 1
max_messages_per_period = 50

[storage]
backend = "memory"

[gateway]
port = 9000
bearer_token = "admin-token"

[prometheus]
enabled = true
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "factory-eu");
    assert_eq!(config.ai.api_key.as_deref(), Some("g-123"));
    assert_eq!(config.ai.max_retries, 3);
    assert_eq!(config.context.max_tokens, 2000);
    assert!(!config.worker.handle_start_command);
    assert_eq!(config.replies.quota_exceeded, "Out of messages.");
    assert_eq!(config.replies.fallback, botfactory_config::BotFactoryConfig::default().replies.fallback);
    assert_eq!(config.supervisor.max_restart_attempts, 2);
    assert_eq!(config.subscription.free.max_messages_per_period, Some(50));
    assert_eq!(config.subscription.premium.max_active_bots, None);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.gateway.port, 9000);
    assert!(config.prometheus.enabled);
}

#[test]
fn empty_input_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.ai.model, "gemini-2.5-flash");
    assert_eq!(config.gateway.port, 8650);
}

#[test]
fn unknown_key_gets_suggestion_and_span() {
    let toml = "[ai]\nmdoel = \"x\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "mdoel");
            assert_eq!(suggestion.as_deref(), Some("model"));
            assert!(span.is_some(), "inline source should resolve a span");
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_tier_key_is_rejected() {
    let toml = "[subscription.basic]\nmax_bots = 3\n";
    let err = load_config_from_str(toml).expect_err("unknown field");
    assert!(err.to_string().contains("max_bots"));
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("telegram"));
}

#[test]
fn wrong_type_is_reported_with_key_path() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(
        &errors[0],
        ConfigError::InvalidType { key, .. } if key == "gateway.port"
    ));
}

#[test]
fn semantic_errors_surface_after_parsing() {
    let toml = r#"
[context]
max_messages = 0

[subscription.starter]
max_active_bots = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert!(rendered.iter().any(|e| e.contains("context.max_messages")));
    assert!(rendered.iter().any(|e| e.contains("subscription.starter")));
}

#[test]
fn effective_config_renders_and_parses_back() {
    let config = load_and_validate_str("[gateway]\nport = 9100\n").unwrap();
    let rendered = to_toml(&config).expect("renders");
    let reparsed = load_and_validate_str(&rendered).expect("rendered config is valid");
    assert_eq!(reparsed.gateway.port, 9100);
    assert_eq!(reparsed.subscription.free, config.subscription.free);
}
