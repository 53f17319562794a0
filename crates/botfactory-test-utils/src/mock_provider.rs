// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion provider for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use botfactory_core::{
    AdapterType, AiServiceError, BotFactoryError, CompletionProvider, CompletionRequest,
    CompletionResponse, HealthStatus, PluginAdapter, TokenUsage,
};

/// One scripted call: optional delay, then the outcome.
#[derive(Debug, Clone)]
struct Scripted {
    delay: Duration,
    outcome: Result<CompletionResponse, AiServiceError>,
}

/// A completion provider that plays back queued outcomes.
///
/// When the queue is empty, "mock response" is returned with a usage of
/// 10 input and 20 output tokens.
#[derive(Clone, Default)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    calls: Arc<AtomicU32>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads plain text responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let script = responses
            .into_iter()
            .map(|text| Scripted {
                delay: Duration::ZERO,
                outcome: Ok(Self::response(text)),
            })
            .collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Self::default()
        }
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.push(Duration::ZERO, Ok(Self::response(text.into())))
            .await;
    }

    /// Queues a response returned without usage, as some providers do.
    pub async fn push_response_without_usage(&self, text: impl Into<String>) {
        let outcome = Ok(CompletionResponse {
            text: text.into(),
            usage: None,
        });
        self.push(Duration::ZERO, outcome).await;
    }

    /// Queues a response reporting the given usage.
    pub async fn push_response_with_usage(&self, text: impl Into<String>, usage: TokenUsage) {
        let outcome = Ok(CompletionResponse {
            text: text.into(),
            usage: Some(usage),
        });
        self.push(Duration::ZERO, outcome).await;
    }

    pub async fn push_error(&self, error: AiServiceError) {
        self.push(Duration::ZERO, Err(error)).await;
    }

    /// Queues a response that takes `delay` to arrive.
    pub async fn push_delayed(&self, delay: Duration, text: impl Into<String>) {
        self.push(delay, Ok(Self::response(text.into()))).await;
    }

    async fn push(&self, delay: Duration, outcome: Result<CompletionResponse, AiServiceError>) {
        self.script
            .lock()
            .await
            .push_back(Scripted { delay, outcome });
    }

    /// Number of `complete` calls so far, including ones still in flight.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in call order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    fn response(text: String) -> CompletionResponse {
        CompletionResponse {
            text,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            }),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AiServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        let next = self.script.lock().await.pop_front();
        match next {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.outcome
            }
            None => Ok(Self::response("mock response".to_string())),
        }
    }
}
