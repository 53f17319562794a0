// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so that a misspelled key is
//! reported at startup instead of being silently ignored.

use std::time::Duration;

use botfactory_core::{Tier, TierLimits};
use serde::{Deserialize, Serialize};

/// Top-level Botfactory configuration.
///
/// Every section is optional and defaults to values suitable for a single
/// host deployment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotFactoryConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Completion service settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Conversation context bounds.
    #[serde(default)]
    pub context: ContextConfig,

    /// Per-bot worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Fixed reply texts sent to end-users.
    #[serde(default)]
    pub replies: RepliesConfig,

    /// Worker supervision and restart policy.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Quotas per subscription tier.
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Usage analytics pipeline.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Persistent store backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Admin HTTP surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "botfactory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Completion service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// API key. When unset the `GEMINI_API_KEY` environment variable is used.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Base URL of the API, overridable for proxies and tests.
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Timeout for a single completion attempt.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt, for transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_ai_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound on a single retry delay.
    #[serde(default = "default_ai_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl AiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ai_model(),
            base_url: default_ai_base_url(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_initial_ms: default_ai_backoff_initial_ms(),
            backoff_max_ms: default_ai_backoff_max_ms(),
        }
    }
}

fn default_ai_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_ai_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_ai_backoff_initial_ms() -> u64 {
    500
}

fn default_ai_backoff_max_ms() -> u64 {
    8_000
}

/// Conversation context bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Maximum number of messages kept per conversation.
    #[serde(default = "default_context_max_messages")]
    pub max_messages: usize,

    /// Maximum cumulative tokens kept per conversation.
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: u32,

    /// Messages loaded from the store when a conversation is first seen.
    #[serde(default = "default_hydrate_limit")]
    pub hydrate_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_context_max_messages(),
            max_tokens: default_context_max_tokens(),
            hydrate_limit: default_hydrate_limit(),
        }
    }
}

fn default_context_max_messages() -> usize {
    20
}

fn default_context_max_tokens() -> u32 {
    4_000
}

fn default_hydrate_limit() -> usize {
    20
}

/// Per-bot worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Conversations of one bot processed at the same time.
    #[serde(default = "default_max_concurrent_conversations")]
    pub max_concurrent_conversations: usize,

    /// Queued messages per conversation before the receive loop waits.
    #[serde(default = "default_lane_capacity")]
    pub lane_capacity: usize,

    /// Idle time after which a conversation's lane is released.
    #[serde(default = "default_lane_idle_secs")]
    pub lane_idle_secs: u64,

    /// Time allowed for the platform connection handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Answer `/start` with the welcome reply instead of the AI.
    #[serde(default = "default_true")]
    pub handle_start_command: bool,
}

impl WorkerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn lane_idle(&self) -> Duration {
        Duration::from_secs(self.lane_idle_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_conversations: default_max_concurrent_conversations(),
            lane_capacity: default_lane_capacity(),
            lane_idle_secs: default_lane_idle_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            handle_start_command: true,
        }
    }
}

fn default_max_concurrent_conversations() -> usize {
    8
}

fn default_lane_capacity() -> usize {
    32
}

fn default_lane_idle_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

/// Fixed replies sent to end-users.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepliesConfig {
    /// Reply to the `/start` command.
    #[serde(default = "default_welcome_reply")]
    pub welcome: String,

    /// Reply when the completion service fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback: String,

    /// Reply when the completion service returns no text.
    #[serde(default = "default_empty_reply")]
    pub empty: String,

    /// Reply when the owner's message quota is used up.
    #[serde(default = "default_quota_reply")]
    pub quota_exceeded: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome_reply(),
            fallback: default_fallback_reply(),
            empty: default_empty_reply(),
            quota_exceeded: default_quota_reply(),
        }
    }
}

fn default_welcome_reply() -> String {
    "Hello! I'm your AI assistant. How can I help you today?".to_string()
}

fn default_fallback_reply() -> String {
    "I'm experiencing technical difficulties. Please try again later.".to_string()
}

fn default_empty_reply() -> String {
    "I'm sorry, I couldn't generate a response. Please try again.".to_string()
}

fn default_quota_reply() -> String {
    "This bot has reached its message limit for the current period. Please try again later."
        .to_string()
}

/// Worker supervision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Time a stopping worker gets to drain before it is abandoned.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Restart faulted workers automatically.
    #[serde(default = "default_true")]
    pub restart_enabled: bool,

    /// Automatic restarts before a manual start is required.
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,

    /// Delay before the first automatic restart; doubles per attempt.
    #[serde(default = "default_restart_backoff_initial_ms")]
    pub restart_backoff_initial_ms: u64,

    /// Upper bound on the restart delay.
    #[serde(default = "default_restart_backoff_max_ms")]
    pub restart_backoff_max_ms: u64,

    /// Start bots that were ACTIVE when the process last exited.
    #[serde(default = "default_true")]
    pub resume_on_startup: bool,
}

impl SupervisorConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            restart_enabled: true,
            max_restart_attempts: default_max_restart_attempts(),
            restart_backoff_initial_ms: default_restart_backoff_initial_ms(),
            restart_backoff_max_ms: default_restart_backoff_max_ms(),
            resume_on_startup: true,
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_max_restart_attempts() -> u32 {
    5
}

fn default_restart_backoff_initial_ms() -> u64 {
    1_000
}

fn default_restart_backoff_max_ms() -> u64 {
    60_000
}

/// Quotas per subscription tier. Omitted limits mean unlimited.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    #[serde(default = "default_free_limits")]
    pub free: TierLimits,

    #[serde(default = "default_starter_limits")]
    pub starter: TierLimits,

    #[serde(default = "default_basic_limits")]
    pub basic: TierLimits,

    #[serde(default = "default_premium_limits")]
    pub premium: TierLimits,
}

impl SubscriptionConfig {
    pub fn limits_for(&self, tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => self.free,
            Tier::Starter => self.starter,
            Tier::Basic => self.basic,
            Tier::Premium => self.premium,
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            free: default_free_limits(),
            starter: default_starter_limits(),
            basic: default_basic_limits(),
            premium: default_premium_limits(),
        }
    }
}

fn default_free_limits() -> TierLimits {
    Tier::Free.default_limits()
}

fn default_starter_limits() -> TierLimits {
    Tier::Starter.default_limits()
}

fn default_basic_limits() -> TierLimits {
    Tier::Basic.default_limits()
}

fn default_premium_limits() -> TierLimits {
    Tier::Premium.default_limits()
}

/// Usage analytics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Persist usage counters.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Events buffered before new ones are dropped.
    #[serde(default = "default_analytics_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: default_analytics_queue_capacity(),
        }
    }
}

fn default_analytics_queue_capacity() -> usize {
    1_024
}

/// Persistent store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("botfactory").join("botfactory.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("botfactory.db"))
        .to_string_lossy()
        .into_owned()
}

/// Admin HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on bot routes. Unset rejects every bot route.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8650
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
}
