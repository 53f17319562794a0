// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram platform adapter.
//!
//! Implements [`PlatformAdapter`] for the Telegram Bot API via teloxide.
//! `connect` checks the token with `getMe` and then starts long polling in
//! a background task that forwards text messages into a channel.

pub mod handler;

use async_trait::async_trait;
use botfactory_core::{
    AdapterType, BotFactoryError, ConnectionError, DeliveryError, HealthStatus, InboundMessage,
    Platform, PlatformAdapter, PlatformCredentials, PluginAdapter,
};
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::{ApiError, RequestError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const INBOUND_CAPACITY: usize = 100;

/// Telegram adapter for one bot.
pub struct TelegramPlatform {
    bot: Option<Bot>,
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: Option<mpsc::Sender<InboundMessage>>,
    cancel: CancellationToken,
    polling_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramPlatform {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            bot: None,
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx: Some(inbound_tx),
            cancel: CancellationToken::new(),
            polling_handle: std::sync::Mutex::new(None),
        }
    }

    fn connected_bot(&self, recipient: &str) -> Result<&Bot, DeliveryError> {
        self.bot
            .as_ref()
            .ok_or_else(|| DeliveryError::new(recipient, "Telegram adapter is not connected"))
    }
}

impl Default for TelegramPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn connection_error(e: RequestError) -> ConnectionError {
    match e {
        RequestError::Api(ApiError::InvalidToken) => {
            ConnectionError::Rejected("Telegram rejected the bot token".into())
        }
        RequestError::Api(api) => ConnectionError::Rejected(api.to_string()),
        other => ConnectionError::Unreachable(other.to_string()),
    }
}

#[async_trait]
impl PluginAdapter for TelegramPlatform {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        let Some(bot) = &self.bot else {
            return Ok(HealthStatus::Degraded("not connected".into()));
        };
        match bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        self.disconnect().await.map_err(BotFactoryError::from)
    }
}

#[async_trait]
impl PlatformAdapter for TelegramPlatform {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn connect(&mut self, credentials: &PlatformCredentials) -> Result<(), ConnectionError> {
        let token = credentials
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectionError::MissingCredentials("token".into()))?;
        handler::validate_token(token)?;

        let Some(tx) = self.inbound_tx.take() else {
            return Err(ConnectionError::Fault(
                "Telegram adapter cannot be reconnected".into(),
            ));
        };

        let bot = Bot::new(token);
        let me = bot.get_me().await.map_err(connection_error)?;
        info!(username = %me.username(), "Telegram token verified, starting long polling");

        let polling_bot = bot.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message| {
                let tx = tx.clone();
                async move {
                    match handler::to_inbound(&msg) {
                        Some(inbound) => {
                            if tx.send(inbound).await.is_err() {
                                warn!("inbound channel closed, dropping Telegram message");
                            }
                        }
                        None => debug!(msg_id = msg.id.0, "ignoring non-text Telegram message"),
                    }
                    respond(())
                }
            });

            let mut dispatcher = Dispatcher::builder(polling_bot, handler)
                .default_handler(|_| async {})
                .build();
            tokio::select! {
                () = dispatcher.dispatch() => warn!("Telegram polling ended"),
                () = cancel.cancelled() => debug!("Telegram polling cancelled"),
            }
        });

        self.bot = Some(bot);
        if let Ok(mut slot) = self.polling_handle.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<InboundMessage>, ConnectionError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            () = self.cancel.cancelled() => Ok(None),
            message = rx.recv() => match message {
                Some(message) => Ok(Some(message)),
                None if self.cancel.is_cancelled() => Ok(None),
                None => Err(ConnectionError::Fault("Telegram polling stopped unexpectedly".into())),
            },
        }
    }

    async fn send(&self, external_user_id: &str, text: &str) -> Result<(), DeliveryError> {
        let bot = self.connected_bot(external_user_id)?;
        let chat_id = external_user_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|e| DeliveryError::new(external_user_id, format!("invalid chat id: {e}")))?;

        for chunk in handler::split_message(text, handler::MAX_MESSAGE_CHARS) {
            bot.send_message(chat_id, chunk)
                .await
                .map_err(|e| DeliveryError::new(external_user_id, e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.cancel.cancel();
        let handle = self
            .polling_handle
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
            debug!("Telegram polling task stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_adapter_metadata() {
        let platform = TelegramPlatform::new();
        assert_eq!(platform.name(), "telegram");
        assert_eq!(platform.version(), semver::Version::new(0, 1, 0));
        assert_eq!(platform.adapter_type(), AdapterType::Platform);
        assert_eq!(platform.platform(), Platform::Telegram);
    }

    #[tokio::test]
    async fn connect_requires_a_token() {
        let mut platform = TelegramPlatform::new();
        let err = platform
            .connect(&PlatformCredentials::default())
            .await
            .unwrap_err();
        assert_eq!(err, ConnectionError::MissingCredentials("token".into()));
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_any_request() {
        let mut platform = TelegramPlatform::new();
        let err = platform
            .connect(&PlatformCredentials::with_token("not-a-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Rejected(_)));
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let platform = TelegramPlatform::new();
        let err = platform.send("42", "hello").await.unwrap_err();
        assert_eq!(err.recipient, "42");
    }

    #[tokio::test]
    async fn receive_after_disconnect_ends_the_sequence() {
        let platform = TelegramPlatform::new();
        platform.disconnect().await.unwrap();
        assert_eq!(platform.receive().await, Ok(None));
        assert_eq!(platform.receive().await, Ok(None));
    }

    #[tokio::test]
    async fn health_check_before_connect_is_degraded() {
        let platform = TelegramPlatform::new();
        assert!(matches!(
            platform.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
