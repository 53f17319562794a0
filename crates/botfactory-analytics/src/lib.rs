// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage analytics.
//!
//! The [`AnalyticsRecorder`] hands events to a bounded queue with
//! `try_send` and returns immediately. A background writer folds each event
//! into the bot's daily bucket in the [`Store`]. A full queue or a failing
//! store loses analytics, never message throughput.

pub mod report;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use botfactory_config::model::AnalyticsConfig;
use botfactory_core::{BotId, Store, TokenUsage, UsageDelta};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use report::{AnalyticsReport, AnalyticsSummary};

/// One analytics event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageEvent {
    /// A reply was produced.
    Completion {
        bot_id: BotId,
        usage: TokenUsage,
        latency: Duration,
        at: DateTime<Utc>,
    },
    /// A new end-user talked to the bot for the first time.
    ConversationStarted { bot_id: BotId, at: DateTime<Utc> },
}

impl UsageEvent {
    fn into_delta(self) -> UsageDelta {
        match self {
            Self::Completion {
                bot_id,
                usage,
                latency,
                at,
            } => UsageDelta {
                bot_id,
                bucket: at.date_naive(),
                messages: 1,
                tokens: usage.total(),
                latency_ms: botfactory_core::types::duration_millis(latency),
                new_conversations: 0,
            },
            Self::ConversationStarted { bot_id, at } => UsageDelta {
                bot_id,
                bucket: at.date_naive(),
                messages: 0,
                tokens: 0,
                latency_ms: 0,
                new_conversations: 1,
            },
        }
    }
}

/// Cheap-to-clone handle for recording usage from the message path.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    tx: Option<mpsc::Sender<UsageEvent>>,
    dropped: Arc<AtomicU64>,
}

impl AnalyticsRecorder {
    /// Starts the background writer and returns the recorder with the
    /// writer's handle.
    ///
    /// The writer exits once every recorder clone has been dropped.
    pub fn spawn(store: Arc<dyn Store>, config: &AnalyticsConfig) -> (Self, AnalyticsWriter) {
        if !config.enabled {
            debug!("analytics persistence disabled");
            return (Self::disabled(), AnalyticsWriter { handle: None });
        }
        let (recorder, rx) = Self::channel(config.queue_capacity);
        let handle = tokio::spawn(run_writer(store, rx));
        (
            recorder,
            AnalyticsWriter {
                handle: Some(handle),
            },
        )
    }

    /// A recorder that only emits process metrics.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn channel(capacity: usize) -> (Self, mpsc::Receiver<UsageEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Records one processed message. Never blocks.
    pub fn record(&self, bot_id: &BotId, usage: TokenUsage, latency: Duration) {
        metrics::counter!("botfactory_messages_total").increment(1);
        metrics::counter!("botfactory_tokens_total").increment(usage.total());
        metrics::histogram!("botfactory_response_latency_seconds").record(latency.as_secs_f64());
        self.enqueue(UsageEvent::Completion {
            bot_id: bot_id.clone(),
            usage,
            latency,
            at: Utc::now(),
        });
    }

    /// Records the first message of a new conversation. Never blocks.
    pub fn record_conversation_started(&self, bot_id: &BotId) {
        metrics::counter!("botfactory_conversations_started_total").increment(1);
        self.enqueue(UsageEvent::ConversationStarted {
            bot_id: bot_id.clone(),
            at: Utc::now(),
        });
    }

    /// Events discarded because the queue was full or the writer had exited.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, event: UsageEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("botfactory_analytics_dropped_total").increment(1);
                debug!(?event, "analytics queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("botfactory_analytics_dropped_total").increment(1);
            }
        }
    }
}

/// Handle to the background writer task.
pub struct AnalyticsWriter {
    handle: Option<JoinHandle<()>>,
}

impl AnalyticsWriter {
    /// Waits up to `timeout` for queued events to be written.
    ///
    /// Only returns early if every [`AnalyticsRecorder`] clone was dropped
    /// first; otherwise the writer is aborted at the deadline.
    pub async fn finish(self, timeout: Duration) {
        let Some(mut handle) = self.handle else {
            return;
        };
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!("analytics writer still busy at shutdown, aborting");
            handle.abort();
        }
    }
}

async fn run_writer(store: Arc<dyn Store>, mut rx: mpsc::Receiver<UsageEvent>) {
    while let Some(event) = rx.recv().await {
        let delta = event.into_delta();
        if let Err(e) = store.record_usage(&delta).await {
            metrics::counter!("botfactory_analytics_write_errors_total").increment(1);
            warn!(bot_id = %delta.bot_id, error = %e, "failed to persist analytics");
        }
    }
    debug!("analytics writer stopped");
}

#[cfg(test)]
mod tests {
    use botfactory_core::{Bot, Platform};
    use botfactory_storage::MemoryStore;

    use super::*;

    fn usage(input: u32, output: u32) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[tokio::test]
    async fn events_are_folded_into_daily_buckets() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("b1", "u1", "Helper", Platform::Telegram);
        let config = AnalyticsConfig::default();
        let (recorder, writer) = AnalyticsRecorder::spawn(store.clone(), &config);

        recorder.record_conversation_started(&bot.id);
        recorder.record(&bot.id, usage(10, 5), Duration::from_millis(300));
        recorder.record(&bot.id, usage(4, 1), Duration::from_millis(100));
        drop(recorder);
        writer.finish(Duration::from_secs(5)).await;

        let buckets = store.analytics(&bot.id, None).await.unwrap();
        assert_eq!(buckets.len(), 1);
        let bucket = &buckets[0];
        assert_eq!(bucket.messages_processed, 2);
        assert_eq!(bucket.tokens_consumed, 20);
        assert_eq!(bucket.total_latency_ms, 400);
        assert_eq!(bucket.new_conversations, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (recorder, _rx) = AnalyticsRecorder::channel(2);
        let bot = BotId::from("b1");
        for _ in 0..5 {
            recorder.record(&bot, usage(1, 1), Duration::ZERO);
        }
        assert_eq!(recorder.dropped(), 3);
    }

    #[tokio::test]
    async fn closed_writer_counts_as_dropped() {
        let (recorder, rx) = AnalyticsRecorder::channel(4);
        drop(rx);
        recorder.record_conversation_started(&BotId::from("b1"));
        assert_eq!(recorder.dropped(), 1);
    }

    #[tokio::test]
    async fn disabled_recorder_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let config = AnalyticsConfig {
            enabled: false,
            ..AnalyticsConfig::default()
        };
        let (recorder, writer) = AnalyticsRecorder::spawn(store.clone(), &config);
        recorder.record(&BotId::from("b1"), usage(1, 1), Duration::ZERO);
        assert_eq!(recorder.dropped(), 0);
        writer.finish(Duration::from_millis(10)).await;
        assert!(store.analytics(&BotId::from("b1"), None).await.unwrap().is_empty());
    }

    #[test]
    fn completion_delta_counts_one_message() {
        let at = Utc::now();
        let delta = UsageEvent::Completion {
            bot_id: BotId::from("b1"),
            usage: usage(7, 3),
            latency: Duration::from_millis(1500),
            at,
        }
        .into_delta();
        assert_eq!(delta.messages, 1);
        assert_eq!(delta.tokens, 10);
        assert_eq!(delta.latency_ms, 1500);
        assert_eq!(delta.bucket, at.date_naive());
    }
}
