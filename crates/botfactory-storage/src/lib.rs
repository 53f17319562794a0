// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for bots, subscriptions, conversations and analytics.
//!
//! [`SqliteStore`] keeps records in a WAL-mode SQLite file with embedded
//! migrations and a single-writer connection from `tokio-rusqlite`.
//! [`MemoryStore`] keeps the same records in process memory.

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;

use std::sync::Arc;

use botfactory_config::model::{StorageBackend, StorageConfig};
use botfactory_core::{BotFactoryError, Store};

pub use adapter::SqliteStore;
pub use database::Database;
pub use memory::MemoryStore;

/// Builds and initializes the store selected by `config.backend`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>, BotFactoryError> {
    let store: Arc<dyn Store> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::new(config.clone())),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    store.initialize().await?;
    tracing::info!(backend = store.name(), "store ready");
    Ok(store)
}
