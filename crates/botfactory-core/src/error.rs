// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Botfactory runtime.
//!
//! Each failure class the runtime distinguishes has its own type so callers
//! can match on it: [`ConnectionError`] for adapters that cannot establish a
//! session, [`DeliveryError`] for outbound sends, [`AiServiceError`] for the
//! completion service. [`BotFactoryError`] wraps all of them for
//! control-plane operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::types::{BotId, BotStatus, Platform};

/// A platform adapter could not establish (or keep) its session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The platform variant exists but has no working transport.
    #[error("{platform} platform is not implemented")]
    NotImplemented { platform: Platform },

    /// A required credential field was not configured for the bot.
    #[error("missing credential: {0}")]
    MissingCredentials(String),

    /// The platform refused the supplied credentials.
    #[error("credentials rejected: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    /// The connection handshake did not complete in time.
    #[error("connection attempt timed out after {0:?}")]
    TimedOut(Duration),

    /// An established session failed in a way the adapter cannot recover from.
    #[error("adapter fault: {0}")]
    Fault(String),
}

/// An outbound message could not be delivered to the end-user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {recipient} failed: {message}")]
pub struct DeliveryError {
    pub recipient: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
        }
    }
}

/// Coarse classification of an [`AiServiceError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    Timeout,
    QuotaExceeded,
    InvalidCredentials,
    Unavailable,
    InvalidRequest,
}

/// Failure of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiServiceError {
    /// A single attempt exceeded the per-call timeout.
    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    /// The AI account is out of quota or rate limited.
    #[error("AI quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The configured API key was rejected.
    #[error("AI credentials rejected: {0}")]
    InvalidCredentials(String),

    /// The service is temporarily unavailable (5xx, network failure).
    #[error("AI service unavailable: {0}")]
    Unavailable(String),

    /// The service rejected the request itself (malformed, blocked).
    #[error("AI request rejected: {0}")]
    InvalidRequest(String),

    /// Every attempt failed with a transient error.
    ///
    /// Classified as [`AiErrorKind::Timeout`], but kept apart from a single
    /// timed-out attempt so callers can tell "never succeeded" from "slow".
    #[error("AI service did not answer after {attempts} attempts (last error: {last})")]
    RetriesExhausted {
        attempts: u32,
        last: Box<AiServiceError>,
    },
}

impl AiServiceError {
    /// Returns the classification used for retry and reply decisions.
    pub fn kind(&self) -> AiErrorKind {
        match self {
            Self::Timeout(_) | Self::RetriesExhausted { .. } => AiErrorKind::Timeout,
            Self::QuotaExceeded(_) => AiErrorKind::QuotaExceeded,
            Self::InvalidCredentials(_) => AiErrorKind::InvalidCredentials,
            Self::Unavailable(_) => AiErrorKind::Unavailable,
            Self::InvalidRequest(_) => AiErrorKind::InvalidRequest,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// `RetriesExhausted` is terminal even though it classifies as a timeout.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// The primary error type for control-plane operations and store access.
#[derive(Debug, Error)]
pub enum BotFactoryError {
    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent store failures (connection, query, serialization).
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Ai(#[from] AiServiceError),

    /// A subscription limit blocks the requested action.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded { reason: String },

    #[error("bot not found: {0}")]
    BotNotFound(BotId),

    /// The bot's current status does not allow the requested action.
    #[error("bot {bot_id} is {status}, cannot {action}")]
    InvalidState {
        bot_id: BotId,
        status: BotStatus,
        action: &'static str,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BotFactoryError {
    /// Wraps any store-level failure as [`BotFactoryError::Persistence`].
    pub fn persistence(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Persistence {
            source: source.into(),
        }
    }

    /// Short machine-readable code, used in admin API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Persistence { .. } => "persistence",
            Self::Connection(ConnectionError::NotImplemented { .. }) => "platform_unavailable",
            Self::Connection(_) => "connection",
            Self::Delivery(_) => "delivery",
            Self::Ai(_) => "ai_service",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::BotNotFound(_) => "bot_not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
