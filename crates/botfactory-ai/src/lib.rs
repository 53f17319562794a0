// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI responder.
//!
//! Turns a personality prompt, a conversation window and a new user message
//! into a [`CompletionRequest`], and runs it against a
//! [`CompletionProvider`] under a per-attempt timeout. Only transient
//! failures (timeouts, unavailability) are retried, with exponential
//! backoff. Quota and credential errors are returned on the first attempt.

pub mod prompt;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use botfactory_config::model::AiConfig;
use botfactory_context::ContextEntry;
use botfactory_core::{
    AiServiceError, AssistantReply, CompletionProvider, CompletionResponse, TokenUsage,
    estimate_tokens,
};
use tokio::time::Instant;
use tracing::{debug, warn};

pub use prompt::{build_request, truncate_to_tokens};
pub use retry::RetryPolicy;

/// Generates assistant replies through a completion provider.
pub struct AiResponder {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
    retry: RetryPolicy,
    max_output_tokens: u32,
    token_budget: u32,
}

impl AiResponder {
    /// `token_budget` bounds any single turn sent to the provider; it should
    /// match the context window's token budget.
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &AiConfig, token_budget: u32) -> Self {
        Self {
            provider,
            timeout: config.request_timeout(),
            retry: RetryPolicy::from(config),
            max_output_tokens: config.max_output_tokens,
            token_budget: token_budget.max(1),
        }
    }

    /// Produces the reply to `new_message` given the prior `context`.
    ///
    /// Exhausting the retries yields [`AiServiceError::RetriesExhausted`],
    /// which classifies as a timeout but is distinct from a single slow
    /// attempt.
    pub async fn generate(
        &self,
        personality: &str,
        context: &[ContextEntry],
        new_message: &str,
    ) -> Result<AssistantReply, AiServiceError> {
        let request = build_request(
            personality,
            context,
            new_message,
            self.token_budget,
            self.max_output_tokens,
        );
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(
                self.timeout,
                self.provider.complete(request.clone()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(AiServiceError::Timeout(self.timeout)),
            };

            let error = match outcome {
                Ok(response) => {
                    let latency = started.elapsed();
                    debug!(attempt, latency_ms = latency.as_millis() as u64, "completion received");
                    let usage = usage_or_estimate(&request, &response);
                    return Ok(AssistantReply {
                        text: response.text,
                        usage,
                        latency,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            metrics::counter!("botfactory_ai_errors_total", "kind" => error.kind().to_string())
                .increment(1);

            if !error.is_transient() {
                warn!(attempt, error = %error, "completion failed, not retrying");
                return Err(error);
            }
            if attempt >= self.retry.max_attempts() {
                warn!(attempts = attempt, error = %error, "completion retries exhausted");
                return Err(AiServiceError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.retry.backoff(attempt);
            warn!(attempt, ?delay, error = %error, "transient completion error, will retry");
            metrics::counter!("botfactory_ai_retries_total").increment(1);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Provider-reported usage, or an estimate from the text lengths.
fn usage_or_estimate(
    request: &botfactory_core::CompletionRequest,
    response: &CompletionResponse,
) -> TokenUsage {
    if let Some(usage) = response.usage {
        return usage;
    }
    let input = request
        .turns
        .iter()
        .map(|turn| estimate_tokens(&turn.content))
        .fold(estimate_tokens(&request.system_prompt), u32::saturating_add);
    TokenUsage {
        input_tokens: input,
        output_tokens: estimate_tokens(&response.text),
    }
}

#[cfg(test)]
mod tests {
    use botfactory_core::{ConversationId, Message, MessageId, Role};
    use botfactory_test_utils::MockProvider;
    use chrono::Utc;

    use super::*;

    fn config(max_retries: u32) -> AiConfig {
        AiConfig {
            request_timeout_secs: 1,
            max_retries,
            backoff_initial_ms: 500,
            backoff_max_ms: 8_000,
            ..AiConfig::default()
        }
    }

    fn responder(provider: &MockProvider, max_retries: u32) -> AiResponder {
        AiResponder::new(Arc::new(provider.clone()), &config(max_retries), 1_000)
    }

    fn entry(role: Role, content: &str, oversized: bool) -> ContextEntry {
        let message = Message {
            id: MessageId::from("m"),
            conversation_id: ConversationId::from("c"),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            token_count: None,
            latency_ms: None,
        };
        ContextEntry {
            tokens: message.tokens(),
            message,
            oversized,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success() {
        let provider = MockProvider::with_responses(vec!["Hi there".into()]);
        let context = vec![
            entry(Role::User, "hello", false),
            entry(Role::Assistant, "hey", false),
        ];
        let reply = responder(&provider, 2)
            .generate("Be kind.", &context, "how are you?")
            .await
            .unwrap();
        assert_eq!(reply.text, "Hi there");
        assert_eq!(reply.attempts, 1);
        assert_eq!(reply.usage.total(), 30);

        let requests = provider.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "Be kind.");
        let contents: Vec<_> = requests[0].turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hey", "how are you?"]);
        assert_eq!(requests[0].turns[2].role, Role::User);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_is_retried_with_backoff() {
        let provider = MockProvider::new();
        provider.push_error(AiServiceError::Unavailable("502".into())).await;
        provider.push_error(AiServiceError::Unavailable("503".into())).await;
        provider.push_response("recovered").await;

        let started = Instant::now();
        let reply = responder(&provider, 2).generate("p", &[], "hi").await.unwrap();
        assert_eq!(reply.text, "recovered");
        assert_eq!(reply.attempts, 3);
        assert_eq!(provider.calls(), 3);
        // 500ms then 1000ms of backoff.
        assert!(started.elapsed() >= Duration::from_millis(1_500));
        assert!(reply.latency >= Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_a_distinct_timeout() {
        let provider = MockProvider::new();
        for _ in 0..3 {
            provider.push_delayed(Duration::from_secs(30), "too late").await;
        }
        let err = responder(&provider, 2).generate("p", &[], "hi").await.unwrap_err();
        assert_eq!(provider.calls(), 3);
        assert_eq!(err.kind(), botfactory_core::AiErrorKind::Timeout);
        match err {
            AiServiceError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, AiServiceError::Timeout(Duration::from_secs(1)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exceeded_is_not_retried() {
        let provider = MockProvider::new();
        provider
            .push_error(AiServiceError::QuotaExceeded("429".into()))
            .await;
        let err = responder(&provider, 3).generate("p", &[], "hi").await.unwrap_err();
        assert_eq!(err, AiServiceError::QuotaExceeded("429".into()));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_credentials_are_not_retried() {
        let provider = MockProvider::new();
        provider
            .push_error(AiServiceError::InvalidCredentials("401".into()))
            .await;
        let err = responder(&provider, 3).generate("p", &[], "hi").await.unwrap_err();
        assert!(matches!(err, AiServiceError::InvalidCredentials(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_still_makes_one_attempt() {
        let provider = MockProvider::new();
        provider.push_error(AiServiceError::Unavailable("down".into())).await;
        let err = responder(&provider, 0).generate("p", &[], "hi").await.unwrap_err();
        assert!(matches!(err, AiServiceError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_turns_are_truncated() {
        let provider = MockProvider::new();
        let responder = AiResponder::new(Arc::new(provider.clone()), &config(0), 10);
        let huge = "x".repeat(400);
        let context = vec![entry(Role::User, &huge, true)];
        responder.generate("p", &context, &huge).await.unwrap();

        let request = &provider.requests().await[0];
        assert_eq!(request.turns.len(), 2);
        for turn in &request.turns {
            assert!(estimate_tokens(&turn.content) <= 10, "turn was not truncated");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_usage_is_estimated() {
        let provider = MockProvider::new();
        provider.push_response_without_usage("abcdefgh").await;
        let reply = responder(&provider, 0)
            .generate("abcd", &[], "abcdabcd")
            .await
            .unwrap();
        assert_eq!(reply.usage.input_tokens, 3);
        assert_eq!(reply.usage.output_tokens, 2);
    }
}
