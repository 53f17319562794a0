// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait for messaging integrations (Telegram, Instagram, WhatsApp).

use async_trait::async_trait;

use crate::error::{ConnectionError, DeliveryError};
use crate::traits::adapter::PluginAdapter;
use crate::types::{Bot, InboundMessage, Platform, PlatformCredentials};

/// Bidirectional transport between one bot and its messaging platform.
///
/// The lifecycle is `connect` once, then any number of concurrent `send`
/// calls alongside a single consumer of `receive`, then `disconnect`.
/// The inbound sequence cannot be restarted: once `receive` has returned
/// `Ok(None)` it keeps doing so.
#[async_trait]
pub trait PlatformAdapter: PluginAdapter {
    /// The platform this adapter talks to.
    fn platform(&self) -> Platform;

    /// Establishes the platform session using the bot's credentials.
    async fn connect(&mut self, credentials: &PlatformCredentials) -> Result<(), ConnectionError>;

    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the adapter is disconnected and `Err` on an
    /// unrecoverable fault.
    async fn receive(&self) -> Result<Option<InboundMessage>, ConnectionError>;

    /// Sends `text` to the chat identified by `external_user_id`.
    async fn send(&self, external_user_id: &str, text: &str) -> Result<(), DeliveryError>;

    /// Releases all platform resources and ends the inbound sequence.
    async fn disconnect(&self) -> Result<(), ConnectionError>;
}

/// Builds the adapter variant matching a bot's platform.
pub trait AdapterFactory: Send + Sync + 'static {
    fn create(&self, bot: &Bot) -> Box<dyn PlatformAdapter>;
}
