// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handling of one inbound message, from quota check to delivery.

use std::sync::Arc;

use botfactory_core::{
    AssistantReply, Bot, Conversation, ConversationKey, InboundMessage, Message, MessageId,
    NewMessage, PlatformAdapter, Role,
};
use botfactory_subscription::Decision;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::services::WorkerServices;

const START_COMMAND: &str = "/start";

/// Processes the inbound messages of one bot.
///
/// Every failure on this path degrades into a reply to the end-user or a
/// log line; nothing here terminates the worker.
pub(crate) struct MessageProcessor {
    bot: Bot,
    adapter: Arc<dyn PlatformAdapter>,
    services: Arc<WorkerServices>,
}

impl MessageProcessor {
    pub(crate) fn new(
        bot: Bot,
        adapter: Arc<dyn PlatformAdapter>,
        services: Arc<WorkerServices>,
    ) -> Self {
        Self {
            bot,
            adapter,
            services,
        }
    }

    pub(crate) async fn handle(&self, inbound: InboundMessage) {
        let services = &self.services;
        let conversation = match services
            .store
            .conversation_for(&self.bot.id, &inbound.external_user_id)
            .await
        {
            Ok((conversation, created)) => {
                if created {
                    debug!(bot_id = %self.bot.id, conversation = %conversation.id, "conversation started");
                    services.analytics.record_conversation_started(&self.bot.id);
                }
                conversation
            }
            Err(e) => {
                error!(bot_id = %self.bot.id, error = %e, "failed to load conversation");
                self.deliver(&inbound.external_user_id, &services.replies.fallback)
                    .await;
                return;
            }
        };
        let key = conversation.key();

        if services.worker.handle_start_command && is_start_command(&inbound.text) {
            let welcome = services.replies.welcome.clone();
            self.record_exchange(&conversation, &key, &inbound, &welcome, None)
                .await;
            self.deliver(&inbound.external_user_id, &welcome).await;
            self.touch().await;
            return;
        }

        match services.gate.can_process_message(&self.bot).await {
            Ok(Decision::Allowed) => {}
            Ok(Decision::Denied(reason)) => {
                info!(bot_id = %self.bot.id, reason = %reason, "message quota exhausted");
                let reply = services.replies.quota_exceeded.clone();
                self.record_exchange(&conversation, &key, &inbound, &reply, None)
                    .await;
                self.deliver(&inbound.external_user_id, &reply).await;
                return;
            }
            Err(e) => {
                error!(bot_id = %self.bot.id, error = %e, "quota check failed");
                self.deliver(&inbound.external_user_id, &services.replies.fallback)
                    .await;
                return;
            }
        }

        self.hydrate(&conversation, &key).await;
        let context = services.context.get_context(&key);

        let (text, reply) = match services
            .responder
            .generate(&self.bot.system_prompt(), &context, &inbound.text)
            .await
        {
            Ok(reply) if reply.text.trim().is_empty() => {
                warn!(bot_id = %self.bot.id, "completion was empty");
                (services.replies.empty.clone(), Some(reply))
            }
            Ok(reply) => (reply.text.clone(), Some(reply)),
            Err(e) => {
                warn!(
                    bot_id = %self.bot.id,
                    kind = %e.kind(),
                    error = %e,
                    "completion failed, sending fallback reply"
                );
                (services.replies.fallback.clone(), None)
            }
        };

        self.record_exchange(&conversation, &key, &inbound, &text, reply.as_ref())
            .await;
        self.deliver(&inbound.external_user_id, &text).await;

        if let Some(reply) = reply {
            services
                .analytics
                .record(&self.bot.id, reply.usage, reply.latency);
        }
        self.touch().await;
    }

    /// Seeds the context window from the store the first time a
    /// conversation is seen by this process.
    async fn hydrate(&self, conversation: &Conversation, key: &ConversationKey) {
        let context = &self.services.context;
        if context.contains(key) {
            return;
        }
        let history = match self
            .services
            .store
            .recent_messages(&conversation.id, self.services.hydrate_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(conversation = %key, error = %e, "failed to load history, starting empty");
                Vec::new()
            }
        };
        context.hydrate(key, history);
    }

    /// Persists the user message and the reply, then appends both to the
    /// context window.
    async fn record_exchange(
        &self,
        conversation: &Conversation,
        key: &ConversationKey,
        inbound: &InboundMessage,
        reply_text: &str,
        reply: Option<&AssistantReply>,
    ) {
        self.hydrate(conversation, key).await;

        // Prompt usage covers the whole request, so the user message keeps an
        // estimate of its own text.
        let user = NewMessage::new(
            conversation.id.clone(),
            Role::User,
            inbound.text.clone(),
            inbound.timestamp,
        );
        let mut assistant = NewMessage::new(
            conversation.id.clone(),
            Role::Assistant,
            reply_text,
            Utc::now(),
        );
        if let Some(reply) = reply {
            assistant = assistant
                .with_tokens(reply.usage.output_tokens)
                .with_latency(reply.latency);
        }

        for message in [user, assistant] {
            let stored = self.persist(message).await;
            self.services.context.append(key, stored);
        }
    }

    /// Appends to the store; on failure the message still reaches the
    /// context window under a local id.
    async fn persist(&self, message: NewMessage) -> Message {
        match self.services.store.append_message(message.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(bot_id = %self.bot.id, error = %e, "failed to persist message");
                Message {
                    id: MessageId(uuid::Uuid::new_v4().to_string()),
                    conversation_id: message.conversation_id,
                    role: message.role,
                    content: message.content,
                    timestamp: message.timestamp,
                    token_count: message.token_count,
                    latency_ms: message.latency_ms,
                }
            }
        }
    }

    /// Releases the context window of a conversation that went idle. The
    /// next message hydrates it again from the store.
    pub(crate) fn retire(&self, external_user_id: &str) {
        let key = ConversationKey::new(self.bot.id.clone(), external_user_id);
        self.services.context.forget(&key);
        debug!(conversation = %key, "idle conversation released");
    }

    async fn deliver(&self, recipient: &str, text: &str) {
        if let Err(e) = self.adapter.send(recipient, text).await {
            metrics::counter!("botfactory_delivery_failures_total").increment(1);
            warn!(bot_id = %self.bot.id, error = %e, "reply lost");
        }
    }

    async fn touch(&self) {
        if let Err(e) = self.services.store.touch_bot(&self.bot.id, Utc::now()).await {
            debug!(bot_id = %self.bot.id, error = %e, "failed to update last activity");
        }
    }
}

fn is_start_command(text: &str) -> bool {
    let mut words = text.split_whitespace();
    words.next().is_some_and(|first| {
        first == START_COMMAND
            || first
                .strip_prefix(START_COMMAND)
                .is_some_and(|rest| rest.starts_with('@'))
    })
}
