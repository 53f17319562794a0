// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini completion provider.
//!
//! Implements [`CompletionProvider`] on top of the `generateContent` REST
//! endpoint. The API key comes from `ai.api_key` or the `GEMINI_API_KEY`
//! environment variable.

pub mod client;
pub mod types;

use async_trait::async_trait;
use botfactory_config::model::AiConfig;
use botfactory_core::{
    AdapterType, AiServiceError, BotFactoryError, CompletionProvider, CompletionRequest,
    CompletionResponse, HealthStatus, PluginAdapter, Role, TokenUsage,
};
use secrecy::SecretString;
use tracing::info;

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, GenerationConfig, Part};

/// Environment variable consulted when the config has no API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini provider implementing [`CompletionProvider`].
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(config: &AiConfig) -> Result<Self, BotFactoryError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())?;
        let client = GeminiClient::new(
            &api_key,
            &config.base_url,
            &config.model,
            config.request_timeout(),
        )
        .map_err(BotFactoryError::Config)?;
        info!(model = %config.model, "Gemini provider initialized");
        Ok(Self { client })
    }

    fn to_wire(request: &CompletionRequest) -> GenerateContentRequest {
        let system_instruction = (!request.system_prompt.trim().is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: Some(request.system_prompt.clone()),
            }],
        });
        let contents = request
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role {
                        Role::Assistant => "model",
                        Role::User | Role::System => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(turn.content.clone()),
                }],
            })
            .collect();
        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: request
                .max_output_tokens
                .map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        }
    }
}

/// Non-empty config value first, then the environment.
fn resolve_api_key(
    configured: Option<&str>,
    from_env: Option<String>,
) -> Result<SecretString, BotFactoryError> {
    configured
        .filter(|key| !key.trim().is_empty())
        .map(str::to_string)
        .or(from_env.filter(|key| !key.trim().is_empty()))
        .map(SecretString::from)
        .ok_or_else(|| {
            BotFactoryError::Config(format!(
                "Gemini API key not found. Set ai.api_key in config or the {API_KEY_ENV} environment variable."
            ))
        })
}

#[async_trait]
impl PluginAdapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, BotFactoryError> {
        Ok(match self.client.check_model().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e @ AiServiceError::InvalidCredentials(_)) => HealthStatus::Unhealthy(e.to_string()),
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), BotFactoryError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AiServiceError> {
        let response = self.client.generate(&Self::to_wire(&request)).await?;
        let text = response.text().trim().to_string();
        let usage = response.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });
        Ok(CompletionResponse { text, usage })
    }
}
