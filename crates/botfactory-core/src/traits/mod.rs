// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Platform transports, completion providers and stores all extend the
//! [`PluginAdapter`] base trait and use `#[async_trait]` for dynamic dispatch.

pub mod adapter;
pub mod platform;
pub mod provider;
pub mod store;

pub use adapter::PluginAdapter;
pub use platform::{AdapterFactory, PlatformAdapter};
pub use provider::CompletionProvider;
pub use store::Store;
