// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin HTTP surface for Botfactory.
//!
//! Exposes bot lifecycle control (start, stop, restart, delete), status,
//! analytics and broadcast over a bearer-authenticated JSON API, plus
//! unauthenticated `/health` and `/metrics` endpoints.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, HealthState, router, serve};
