// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instagram platform adapter placeholder.
//!
//! Bots can be configured for Instagram, but there is no transport yet:
//! `connect` fails with [`ConnectionError::NotImplemented`] so the bot is
//! reported as unavailable through the regular start error path.

use async_trait::async_trait;
use botfactory_core::{
    AdapterType, BotFactoryError, ConnectionError, DeliveryError, HealthStatus, InboundMessage,
    Platform, PlatformAdapter, PlatformCredentials, PluginAdapter,
};
use tracing::info;

#[derive(Debug, Default)]
pub struct InstagramPlatform;

impl InstagramPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for InstagramPlatform {
    fn name(&self) -> &str {
        "instagram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        Ok(HealthStatus::Unhealthy("Instagram is not implemented".into()))
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for InstagramPlatform {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn connect(&mut self, _credentials: &PlatformCredentials) -> Result<(), ConnectionError> {
        info!("Instagram connect requested, platform not implemented");
        Err(ConnectionError::NotImplemented {
            platform: Platform::Instagram,
        })
    }

    async fn receive(&self) -> Result<Option<InboundMessage>, ConnectionError> {
        Ok(None)
    }

    async fn send(&self, external_user_id: &str, _text: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::new(
            external_user_id,
            "Instagram is not implemented",
        ))
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}
