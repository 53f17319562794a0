// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps a bot's platform to its adapter.

use botfactory_core::{AdapterFactory, Bot, Platform, PlatformAdapter};
use botfactory_instagram::InstagramPlatform;
use botfactory_telegram::TelegramPlatform;
use botfactory_whatsapp::WhatsappPlatform;

/// Builds the compiled-in adapter for each [`Platform`].
pub struct DefaultPlatformFactory;

impl AdapterFactory for DefaultPlatformFactory {
    fn create(&self, bot: &Bot) -> Box<dyn PlatformAdapter> {
        match bot.platform {
            Platform::Telegram => Box::new(TelegramPlatform::new()),
            Platform::Instagram => Box::new(InstagramPlatform::new()),
            Platform::Whatsapp => Box::new(WhatsappPlatform::new()),
        }
    }
}
