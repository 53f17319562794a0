// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` API.
//!
//! One call is one attempt; retry policy lives in the responder. Failures
//! are classified into [`AiServiceError`] variants by HTTP status.

use std::time::Duration;

use botfactory_core::AiServiceError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: &SecretString,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        let mut key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|e| format!("invalid API key header value: {e}"))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }

    /// Sends one `generateContent` request.
    pub async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AiServiceError> {
        let url = format!("{}:generateContent", self.model_url());
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "generateContent response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body)
            .map_err(|e| AiServiceError::InvalidRequest(format!("unexpected response body: {e}")))
    }

    /// Fetches the model description; succeeds only with a usable key.
    pub async fn check_model(&self) -> Result<(), AiServiceError> {
        let response = self
            .client
            .get(self.model_url())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    fn transport_error(&self, e: reqwest::Error) -> AiServiceError {
        if e.is_timeout() {
            AiServiceError::Timeout(self.timeout)
        } else {
            AiServiceError::Unavailable(format!("HTTP request failed: {e}"))
        }
    }
}

/// Maps a non-success status (and its error body) to an error class.
pub fn classify_status(status: StatusCode, body: &str) -> AiServiceError {
    let api_error = serde_json::from_str::<ApiErrorResponse>(body).ok().map(|r| r.error);
    let message = match &api_error {
        Some(err) => format!(
            "Gemini API error ({}): {}",
            err.status.as_deref().unwrap_or("unknown"),
            err.message
        ),
        None => format!("API returned {status}: {body}"),
    };

    match status.as_u16() {
        401 | 403 => AiServiceError::InvalidCredentials(message),
        429 => AiServiceError::QuotaExceeded(message),
        408 => AiServiceError::Unavailable(message),
        400 if api_error.as_ref().is_some_and(|e| e.is_invalid_key()) => {
            AiServiceError::InvalidCredentials(message)
        }
        s if (500..600).contains(&s) => AiServiceError::Unavailable(message),
        _ => AiServiceError::InvalidRequest(message),
    }
}
