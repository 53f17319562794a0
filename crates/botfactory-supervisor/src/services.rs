// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Components shared by every worker of a process.

use std::sync::Arc;

use botfactory_ai::AiResponder;
use botfactory_analytics::AnalyticsRecorder;
use botfactory_config::model::{RepliesConfig, WorkerConfig};
use botfactory_context::ConversationContextManager;
use botfactory_core::Store;
use botfactory_subscription::SubscriptionGate;

/// Everything a worker needs besides its bot and adapter.
pub struct WorkerServices {
    pub store: Arc<dyn Store>,
    pub context: Arc<ConversationContextManager>,
    pub responder: Arc<AiResponder>,
    pub gate: Arc<SubscriptionGate>,
    pub analytics: AnalyticsRecorder,
    pub worker: WorkerConfig,
    pub replies: RepliesConfig,
    /// Messages loaded from the store to seed a cold conversation.
    pub hydrate_limit: usize,
}
