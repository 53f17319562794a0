// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Botfactory integration tests.
//!
//! # Components
//!
//! - [`MockProvider`] - completion provider with scripted outcomes
//! - [`MockPlatform`] - platform adapter with message injection and capture
//! - [`MockAdapterFactory`] - hands out [`MockPlatform`]s whose handles the
//!   test keeps

pub mod mock_factory;
pub mod mock_platform;
pub mod mock_provider;

pub use mock_factory::MockAdapterFactory;
pub use mock_platform::{MockPlatform, MockPlatformHandle};
pub use mock_provider::MockProvider;
