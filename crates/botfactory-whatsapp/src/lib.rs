// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp platform adapter.
//!
//! No Business API transport exists yet; every connect attempt fails with
//! [`ConnectionError::NotImplemented`].

use async_trait::async_trait;
use botfactory_core::{
    AdapterType, BotFactoryError, ConnectionError, DeliveryError, HealthStatus, InboundMessage,
    Platform, PlatformAdapter, PlatformCredentials, PluginAdapter,
};
use tracing::info;

const UNAVAILABLE: &str = "WhatsApp is not implemented";

#[derive(Debug, Default)]
pub struct WhatsappPlatform;

impl WhatsappPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for WhatsappPlatform {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        Ok(HealthStatus::Unhealthy(UNAVAILABLE.into()))
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for WhatsappPlatform {
    fn platform(&self) -> Platform {
        Platform::Whatsapp
    }

    async fn connect(&mut self, credentials: &PlatformCredentials) -> Result<(), ConnectionError> {
        info!(has_token = credentials.token.is_some(), "{UNAVAILABLE}");
        Err(ConnectionError::NotImplemented {
            platform: Platform::Whatsapp,
        })
    }

    async fn receive(&self) -> Result<Option<InboundMessage>, ConnectionError> {
        Ok(None)
    }

    async fn send(&self, external_user_id: &str, _text: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::new(external_user_id, UNAVAILABLE))
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_even_with_credentials() {
        let mut platform = WhatsappPlatform::new();
        for credentials in [
            PlatformCredentials::default(),
            PlatformCredentials::with_token("token"),
        ] {
            let err = platform.connect(&credentials).await.unwrap_err();
            assert_eq!(err.to_string(), "whatsapp platform is not implemented");
        }
    }

    #[tokio::test]
    async fn reports_unhealthy() {
        let platform = WhatsappPlatform::new();
        assert_eq!(
            platform.health_check().await.unwrap(),
            HealthStatus::Unhealthy(UNAVAILABLE.into())
        );
        assert_eq!(platform.name(), "whatsapp");
        let err = platform.send("15550001", "hi").await.unwrap_err();
        assert_eq!(err.recipient, "15550001");
    }
}
