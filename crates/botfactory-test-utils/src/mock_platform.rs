// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter with injectable inbound messages and captured
//! outbound messages.
//!
//! The adapter is usually boxed and owned by a worker, so tests drive it
//! through a [`MockPlatformHandle`] that shares its state.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use botfactory_core::{
    AdapterType, BotFactoryError, ConnectionError, DeliveryError, HealthStatus, InboundMessage,
    Platform, PlatformAdapter, PlatformCredentials, PluginAdapter,
};

#[derive(Default)]
struct State {
    inbound: VecDeque<InboundMessage>,
    sent: Vec<(String, String)>,
    connected: bool,
    connects: u32,
    disconnects: u32,
    connect_failures: VecDeque<ConnectionError>,
    connect_delay: Duration,
    fault: Option<ConnectionError>,
    failing_recipients: HashSet<String>,
    last_credentials: Option<PlatformCredentials>,
}

/// Shared view of a [`MockPlatform`]'s state.
#[derive(Clone, Default)]
pub struct MockPlatformHandle {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl MockPlatformHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an adapter backed by this handle.
    pub fn adapter(&self) -> MockPlatform {
        MockPlatform {
            handle: self.clone(),
        }
    }

    /// Queues a message for the next `receive()`.
    pub async fn inject(&self, message: InboundMessage) {
        self.state.lock().await.inbound.push_back(message);
        self.notify.notify_one();
    }

    /// Convenience for `inject(InboundMessage::new(user, text))`.
    pub async fn inject_text(&self, external_user_id: &str, text: &str) {
        self.inject(InboundMessage::new(external_user_id, text)).await;
    }

    /// Makes the next `connect()` fail with `error`.
    pub async fn fail_next_connect(&self, error: ConnectionError) {
        self.state.lock().await.connect_failures.push_back(error);
    }

    /// Delays every `connect()` by `delay`.
    pub async fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().await.connect_delay = delay;
    }

    /// Makes the pending or next `receive()` fail with `error`.
    pub async fn inject_fault(&self, error: ConnectionError) {
        self.state.lock().await.fault = Some(error);
        self.notify.notify_one();
    }

    /// Makes every send to `recipient` fail.
    pub async fn fail_sends_to(&self, recipient: &str) {
        self.state
            .lock()
            .await
            .failing_recipients
            .insert(recipient.to_string());
    }

    /// `(recipient, text)` pairs delivered so far.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().await.sent.clone()
    }

    /// Texts delivered to one recipient.
    pub async fn sent_to(&self, recipient: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Polls until at least `count` messages were sent or `timeout` passes.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn connects(&self) -> u32 {
        self.state.lock().await.connects
    }

    pub async fn disconnects(&self) -> u32 {
        self.state.lock().await.disconnects
    }

    pub async fn last_credentials(&self) -> Option<PlatformCredentials> {
        self.state.lock().await.last_credentials.clone()
    }
}

/// A mock messaging platform for testing.
pub struct MockPlatform {
    handle: MockPlatformHandle,
}

impl MockPlatform {
    pub fn new() -> Self {
        MockPlatformHandle::new().adapter()
    }

    pub fn handle(&self) -> MockPlatformHandle {
        self.handle.clone()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        if self.handle.is_connected().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("not connected".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        self.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatform {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn connect(&mut self, credentials: &PlatformCredentials) -> Result<(), ConnectionError> {
        let delay = self.handle.state.lock().await.connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.handle.state.lock().await;
        state.connects += 1;
        state.last_credentials = Some(credentials.clone());
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        state.connected = true;
        state.fault = None;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<InboundMessage>, ConnectionError> {
        loop {
            {
                let mut state = self.handle.state.lock().await;
                if let Some(fault) = state.fault.take() {
                    state.connected = false;
                    return Err(fault);
                }
                if let Some(message) = state.inbound.pop_front() {
                    return Ok(Some(message));
                }
                if !state.connected {
                    return Ok(None);
                }
            }
            self.handle.notify.notified().await;
        }
    }

    async fn send(&self, external_user_id: &str, text: &str) -> Result<(), DeliveryError> {
        let mut state = self.handle.state.lock().await;
        if state.failing_recipients.contains(external_user_id) {
            return Err(DeliveryError::new(external_user_id, "mock delivery failure"));
        }
        state
            .sent
            .push((external_user_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        {
            let mut state = self.handle.state.lock().await;
            if state.connected {
                state.disconnects += 1;
            }
            state.connected = false;
        }
        self.handle.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_returns_injected_messages_in_order() {
        let mut platform = MockPlatform::new();
        let handle = platform.handle();
        platform.connect(&PlatformCredentials::default()).await.unwrap();
        handle.inject_text("u1", "first").await;
        handle.inject_text("u1", "second").await;
        assert_eq!(platform.receive().await.unwrap().unwrap().text, "first");
        assert_eq!(platform.receive().await.unwrap().unwrap().text, "second");
    }

    #[tokio::test]
    async fn receive_ends_after_disconnect() {
        let mut platform = MockPlatform::new();
        platform.connect(&PlatformCredentials::default()).await.unwrap();
        let platform = Arc::new(platform);
        let receiver = Arc::clone(&platform);
        let pending = tokio::spawn(async move { receiver.receive().await });
        tokio::task::yield_now().await;
        platform.disconnect().await.unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), None);
        assert_eq!(platform.handle().disconnects().await, 1);
    }

    #[tokio::test]
    async fn scripted_connect_failure_is_returned_once() {
        let mut platform = MockPlatform::new();
        let handle = platform.handle();
        handle
            .fail_next_connect(ConnectionError::Rejected("bad token".into()))
            .await;
        assert!(platform.connect(&PlatformCredentials::default()).await.is_err());
        assert!(platform.connect(&PlatformCredentials::default()).await.is_ok());
        assert_eq!(handle.connects().await, 2);
    }

    #[tokio::test]
    async fn fault_surfaces_from_receive() {
        let mut platform = MockPlatform::new();
        let handle = platform.handle();
        platform.connect(&PlatformCredentials::default()).await.unwrap();
        handle.inject_fault(ConnectionError::Fault("socket closed".into())).await;
        assert!(matches!(
            platform.receive().await,
            Err(ConnectionError::Fault(_))
        ));
    }

    #[tokio::test]
    async fn failing_recipient_gets_delivery_error() {
        let platform = MockPlatform::new();
        let handle = platform.handle();
        handle.fail_sends_to("u2").await;
        assert!(platform.send("u1", "hi").await.is_ok());
        let err = platform.send("u2", "hi").await.unwrap_err();
        assert_eq!(err.recipient, "u2");
        assert_eq!(handle.sent_to("u1").await, vec!["hi".to_string()]);
    }
}
