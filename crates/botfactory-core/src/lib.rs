// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Botfactory bot runtime.
//!
//! This crate provides the domain types, the error taxonomy and the adapter
//! traits shared by every other crate in the workspace. Platform transports,
//! completion providers and persistent stores implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AiErrorKind, AiServiceError, BotFactoryError, ConnectionError, DeliveryError};
pub use types::{
    AdapterType, AssistantReply, Bot, BotAnalytics, BotId, BotStatus, CompletionRequest,
    CompletionResponse, Conversation, ConversationId, ConversationKey, HealthStatus,
    InboundMessage, Message, MessageId, NewMessage, Platform, PlatformCredentials, PromptTurn,
    Role, Subscription, Tier, TierLimits, TokenUsage, UsageDelta, UserId, estimate_tokens,
};

pub use traits::{AdapterFactory, CompletionProvider, PlatformAdapter, PluginAdapter, Store};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_object_safe() {
        fn _platform(_: &dyn PlatformAdapter) {}
        fn _provider(_: &dyn CompletionProvider) {}
        fn _store(_: &dyn Store) {}
        fn _factory(_: &dyn AdapterFactory) {}
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Platform, AdapterType::Provider, AdapterType::Storage] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
    }
}
