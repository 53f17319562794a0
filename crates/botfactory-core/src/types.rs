// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the adapter traits and the runtime crates.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a configured bot.
    BotId
);
string_id!(
    /// Identifier of a platform user who owns bots and a subscription.
    UserId
);
string_id!(
    /// Identifier of a persisted conversation.
    ConversationId
);
string_id!(
    /// Identifier of a persisted message.
    MessageId
);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Platform,
    Provider,
    Storage,
}

/// Messaging platform a bot is bound to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Instagram,
    Whatsapp,
}

/// Lifecycle status of a bot.
///
/// Only the supervisor moves a bot between these states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    /// Created but never started.
    Pending,
    /// A worker is (or should be) serving traffic.
    Active,
    /// Stopped, failed to connect, or faulted.
    Inactive,
}

impl BotStatus {
    /// Returns whether the supervisor may move a bot from `self` to `next`.
    pub fn can_transition_to(self, next: BotStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Active) => true,
            (Self::Pending, Self::Inactive) => true,
            (Self::Pending, Self::Pending) => false,
            (Self::Active, Self::Inactive) => true,
            (Self::Active, Self::Active) => true,
            (Self::Active, Self::Pending) => false,
            (Self::Inactive, Self::Active) => true,
            (Self::Inactive, Self::Inactive) => true,
            (Self::Inactive, Self::Pending) => false,
        }
    }

    /// Bots may only be deleted once stopped.
    pub fn is_deletable(self) -> bool {
        match self {
            Self::Inactive => true,
            Self::Pending | Self::Active => false,
        }
    }
}

/// Subscription tier, ordered from smallest to largest quota.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Starter,
    Basic,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Starter, Tier::Basic, Tier::Premium];

    /// Built-in quota table, used when configuration does not override it.
    pub fn default_limits(self) -> TierLimits {
        match self {
            Self::Free => TierLimits::bounded(1, 100),
            Self::Starter => TierLimits::bounded(3, 1_000),
            Self::Basic => TierLimits::bounded(10, 5_000),
            Self::Premium => TierLimits::unlimited(),
        }
    }
}

/// Quotas attached to a tier. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierLimits {
    /// Maximum number of concurrently ACTIVE bots per user.
    #[serde(default)]
    pub max_active_bots: Option<u32>,
    /// Maximum number of processed messages per calendar month.
    #[serde(default)]
    pub max_messages_per_period: Option<u64>,
}

impl TierLimits {
    pub const fn bounded(max_active_bots: u32, max_messages_per_period: u64) -> Self {
        Self {
            max_active_bots: Some(max_active_bots),
            max_messages_per_period: Some(max_messages_per_period),
        }
    }

    pub const fn unlimited() -> Self {
        Self {
            max_active_bots: None,
            max_messages_per_period: None,
        }
    }

    /// Returns whether every quota in `self` is at least as large as in `other`.
    pub fn covers(&self, other: &TierLimits) -> bool {
        fn at_least<T: PartialOrd>(a: Option<T>, b: Option<T>) -> bool {
            match (a, b) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(a), Some(b)) => a >= b,
            }
        }
        at_least(self.max_active_bots, other.max_active_bots)
            && at_least(self.max_messages_per_period, other.max_messages_per_period)
    }
}

/// A user's subscription record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub tier: Tier,
    pub period_start: DateTime<Utc>,
    pub active: bool,
}

impl Subscription {
    /// An inactive subscription falls back to the free tier.
    pub fn effective_tier(&self) -> Tier {
        if self.active { self.tier } else { Tier::Free }
    }
}

/// Opaque, platform-specific connection settings for one bot.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCredentials {
    /// Bot token or access token.
    #[serde(default)]
    pub token: Option<String>,
    /// Webhook endpoint for platforms that push updates.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Polling interval for platforms that are polled.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl PlatformCredentials {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("webhook_url", &self.webhook_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

/// Personality used when a bot has none configured.
pub const DEFAULT_PERSONALITY: &str = "You are a helpful assistant.";

/// A configured chatbot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub owner: UserId,
    pub name: String,
    pub platform: Platform,
    pub personality: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub status: BotStatus,
    #[serde(default)]
    pub credentials: PlatformCredentials,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

impl Bot {
    /// Creates a PENDING bot with the default personality.
    pub fn new(
        id: impl Into<BotId>,
        owner: impl Into<UserId>,
        name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            name: name.into(),
            platform,
            personality: DEFAULT_PERSONALITY.to_string(),
            instructions: None,
            status: BotStatus::Pending,
            credentials: PlatformCredentials::default(),
            created_at: Utc::now(),
            last_active: None,
        }
    }

    /// The personality followed by the optional instructions.
    pub fn system_prompt(&self) -> String {
        match self.instructions.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{}\n\n{}", self.personality, extra),
            _ => self.personality.clone(),
        }
    }
}

/// Key of a conversation: one bot talking to one external end-user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub bot_id: BotId,
    pub external_user_id: String,
}

impl ConversationKey {
    pub fn new(bot_id: BotId, external_user_id: impl Into<String>) -> Self {
        Self {
            bot_id,
            external_user_id: external_user_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bot_id, self.external_user_id)
    }
}

/// A persisted conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub bot_id: BotId,
    pub external_user_id: String,
    pub started_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: u64,
}

impl Conversation {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.bot_id.clone(), self.external_user_id.clone())
    }
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A recorded, immutable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub token_count: Option<u32>,
    /// Time taken to produce an assistant reply.
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

impl Message {
    /// The recorded token count, or an estimate from the content.
    pub fn tokens(&self) -> u32 {
        self.token_count
            .unwrap_or_else(|| estimate_tokens(&self.content))
    }
}

/// A message about to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub token_count: Option<u32>,
    pub latency_ms: Option<u64>,
}

impl NewMessage {
    pub fn new(
        conversation_id: ConversationId,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            role,
            content: content.into(),
            timestamp,
            token_count: None,
            latency_ms: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.token_count = Some(tokens);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(duration_millis(latency));
        self
    }
}

/// A message delivered by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform-specific chat id the reply goes back to.
    pub external_user_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Display name of the sender, when the platform provides one.
    #[serde(default)]
    pub sender_name: Option<String>,
}

impl InboundMessage {
    pub fn new(external_user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            external_user_id: external_user_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            sender_name: None,
        }
    }
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// One turn of prior conversation sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTurn {
    pub role: Role,
    pub content: String,
}

/// Request handed to a [`crate::CompletionProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Personality and instructions.
    pub system_prompt: String,
    /// Prior turns oldest first, ending with the new user message.
    pub turns: Vec<PromptTurn>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Raw answer from a completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    /// Provider-reported usage, if any.
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Reply produced by the responder for one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
    pub usage: TokenUsage,
    /// Wall time from the first attempt to the successful answer.
    pub latency: Duration,
    pub attempts: u32,
}

/// Daily usage counters for one bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotAnalytics {
    pub bot_id: BotId,
    pub bucket: NaiveDate,
    pub messages_processed: u64,
    pub tokens_consumed: u64,
    pub total_latency_ms: u64,
    pub new_conversations: u64,
}

impl BotAnalytics {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.messages_processed == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.messages_processed as f64
        }
    }
}

/// Increment applied to a [`BotAnalytics`] bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDelta {
    pub bot_id: BotId,
    pub bucket: NaiveDate,
    pub messages: u64,
    pub tokens: u64,
    pub latency_ms: u64,
    pub new_conversations: u64,
}

/// Estimates the token count of `text` at four characters per token.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Converts a duration to whole milliseconds, saturating.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_round_trips_in_uppercase() {
        for status in [BotStatus::Pending, BotStatus::Active, BotStatus::Inactive] {
            let s = status.to_string();
            assert_eq!(s, s.to_uppercase());
            assert_eq!(BotStatus::from_str(&s).unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }

    #[test]
    fn status_never_returns_to_pending() {
        for from in [BotStatus::Pending, BotStatus::Active, BotStatus::Inactive] {
            assert!(!from.can_transition_to(BotStatus::Pending));
        }
        assert!(BotStatus::Pending.can_transition_to(BotStatus::Active));
        assert!(BotStatus::Inactive.can_transition_to(BotStatus::Active));
        assert!(BotStatus::Active.can_transition_to(BotStatus::Inactive));
    }

    #[test]
    fn only_inactive_bots_are_deletable() {
        assert!(BotStatus::Inactive.is_deletable());
        assert!(!BotStatus::Active.is_deletable());
        assert!(!BotStatus::Pending.is_deletable());
    }

    #[test]
    fn default_tier_limits_are_monotonic() {
        for pair in Tier::ALL.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            assert!(lower < higher);
            assert!(
                higher.default_limits().covers(&lower.default_limits()),
                "{higher} must cover {lower}"
            );
        }
        assert_eq!(Tier::Free.default_limits(), TierLimits::bounded(1, 100));
        assert_eq!(Tier::Premium.default_limits(), TierLimits::unlimited());
    }

    #[test]
    fn bounded_limits_do_not_cover_unlimited() {
        assert!(!TierLimits::bounded(100, 100).covers(&TierLimits::unlimited()));
        assert!(TierLimits::unlimited().covers(&TierLimits::bounded(100, 100)));
    }

    #[test]
    fn inactive_subscription_falls_back_to_free() {
        let sub = Subscription {
            user_id: UserId::from("u1"),
            tier: Tier::Premium,
            period_start: Utc::now(),
            active: false,
        };
        assert_eq!(sub.effective_tier(), Tier::Free);
    }

    #[test]
    fn system_prompt_appends_instructions() {
        let mut bot = Bot::new("b1", "u1", "Helper", Platform::Telegram);
        assert_eq!(bot.system_prompt(), DEFAULT_PERSONALITY);
        bot.instructions = Some("Answer in French.".into());
        assert_eq!(
            bot.system_prompt(),
            "You are a helpful assistant.\n\nAnswer in French."
        );
        bot.instructions = Some("   ".into());
        assert_eq!(bot.system_prompt(), DEFAULT_PERSONALITY);
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = PlatformCredentials::with_token("123:secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn platform_parses_lowercase() {
        assert_eq!(Platform::from_str("telegram").unwrap(), Platform::Telegram);
        assert_eq!(Platform::Whatsapp.to_string(), "whatsapp");
    }

    #[test]
    fn analytics_average_handles_empty_bucket() {
        let mut bucket = BotAnalytics {
            bot_id: BotId::from("b1"),
            bucket: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            messages_processed: 0,
            tokens_consumed: 0,
            total_latency_ms: 0,
            new_conversations: 0,
        };
        assert_eq!(bucket.avg_latency_ms(), 0.0);
        bucket.messages_processed = 4;
        bucket.total_latency_ms = 1000;
        assert_eq!(bucket.avg_latency_ms(), 250.0);
    }
}
