// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter factory that hands out [`MockPlatform`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use botfactory_core::{AdapterFactory, Bot, BotId, PlatformAdapter};

use crate::mock_platform::MockPlatformHandle;

/// Creates one [`MockPlatformHandle`] per bot id and reuses it on every
/// later `create`, so tests observe reconnects through the same handle.
#[derive(Default)]
pub struct MockAdapterFactory {
    handles: Mutex<HashMap<BotId, MockPlatformHandle>>,
    created: AtomicU32,
}

impl MockAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `bot_id`, created on first use.
    pub fn handle(&self, bot_id: &BotId) -> MockPlatformHandle {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bot_id.clone())
            .or_default()
            .clone()
    }

    /// Number of adapters created so far.
    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn create(&self, bot: &Bot) -> Box<dyn PlatformAdapter> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(self.handle(&bot.id).adapter())
    }
}

#[cfg(test)]
mod tests {
    use botfactory_core::Platform;

    use super::*;

    #[tokio::test]
    async fn handles_are_shared_per_bot() {
        let factory = MockAdapterFactory::new();
        let bot = Bot::new("b1", "u1", "Helper", Platform::Telegram);
        let adapter = factory.create(&bot);
        factory.handle(&bot.id).inject_text("u1", "hello").await;
        let received = adapter.receive().await.unwrap().unwrap();
        assert_eq!(received.text, "hello");
        assert_eq!(factory.created(), 1);
    }
}
