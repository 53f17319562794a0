// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion provider trait for AI services.

use async_trait::async_trait;

use crate::error::AiServiceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse};

/// A single-shot completion endpoint.
///
/// Implementations perform exactly one attempt per call and classify the
/// failure; timeouts and retries are applied by the caller.
#[async_trait]
pub trait CompletionProvider: PluginAdapter {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AiServiceError>;
}
