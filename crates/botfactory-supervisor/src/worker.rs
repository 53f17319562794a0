// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-bot worker.
//!
//! A worker moves through `Connecting -> Running -> Draining -> Stopped`,
//! or ends in `Faulted` when its adapter fails. The connect phase runs in
//! the caller so a failed start is reported synchronously; the receive loop
//! runs in its own task until the stop token is cancelled or the adapter
//! faults.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use botfactory_core::{Bot, BotId, ConnectionError, PlatformAdapter};
use serde::Serialize;
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::lanes::Lanes;
use crate::processor::MessageProcessor;
use crate::services::WorkerServices;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Connecting,
    Running,
    Draining,
    Stopped,
    Faulted,
}

impl WorkerState {
    /// Whether the worker still owns a platform session.
    pub fn is_live(self) -> bool {
        match self {
            Self::Connecting | Self::Running | Self::Draining => true,
            Self::Stopped | Self::Faulted => false,
        }
    }
}

/// Sent to the supervisor when a running worker faults.
#[derive(Debug)]
pub(crate) struct FaultReport {
    pub bot_id: BotId,
    pub generation: u64,
    pub error: ConnectionError,
}

/// Supervisor-side handle of a running worker.
pub(crate) struct WorkerHandle {
    pub generation: u64,
    cancel: CancellationToken,
    state: watch::Receiver<WorkerState>,
    adapter: Arc<dyn PlatformAdapter>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        !self.join.is_finished() && self.state().is_live()
    }

    pub fn adapter(&self) -> Arc<dyn PlatformAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Signals the worker to drain and waits up to `timeout` for it.
    ///
    /// Returns `false` if the worker had to be aborted.
    pub async fn stop(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        let mut join = self.join;
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "worker task ended abnormally");
                true
            }
            Err(_) => {
                join.abort();
                if let Err(e) = self.adapter.disconnect().await {
                    debug!(error = %e, "disconnect after abort failed");
                }
                false
            }
        }
    }
}

/// Counts a worker task as live for as long as it exists, including when
/// the task is aborted.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("botfactory_active_workers").increment(1.0);
        Self(live)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
        metrics::gauge!("botfactory_active_workers").decrement(1.0);
    }
}

pub(crate) struct BotWorker {
    bot: Bot,
    adapter: Arc<dyn PlatformAdapter>,
    services: Arc<WorkerServices>,
    cancel: CancellationToken,
    state: watch::Sender<WorkerState>,
    faults: mpsc::UnboundedSender<FaultReport>,
    generation: u64,
    _live: LiveGuard,
}

impl BotWorker {
    /// Connects the adapter and, on success, spawns the receive loop.
    pub(crate) async fn start(
        bot: Bot,
        mut adapter: Box<dyn PlatformAdapter>,
        services: Arc<WorkerServices>,
        faults: mpsc::UnboundedSender<FaultReport>,
        generation: u64,
        live: Arc<AtomicUsize>,
    ) -> Result<WorkerHandle, ConnectionError> {
        let (state, state_rx) = watch::channel(WorkerState::Connecting);
        let connect_timeout = services.worker.connect_timeout();

        debug!(bot_id = %bot.id, platform = %bot.platform, "connecting");
        let connected =
            match tokio::time::timeout(connect_timeout, adapter.connect(&bot.credentials)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::TimedOut(connect_timeout)),
            };
        if let Err(e) = connected {
            state.send_replace(WorkerState::Faulted);
            metrics::counter!("botfactory_connect_failures_total", "platform" => bot.platform.to_string())
                .increment(1);
            warn!(bot_id = %bot.id, error = %e, "platform connection failed");
            return Err(e);
        }

        let adapter: Arc<dyn PlatformAdapter> = Arc::from(adapter);
        let cancel = CancellationToken::new();
        state.send_replace(WorkerState::Running);
        info!(bot_id = %bot.id, platform = %bot.platform, "bot worker running");

        let worker = Self {
            bot,
            adapter: Arc::clone(&adapter),
            services,
            cancel: cancel.clone(),
            state,
            faults,
            generation,
            _live: LiveGuard::new(live),
        };
        let join = tokio::spawn(worker.run());

        Ok(WorkerHandle {
            generation,
            cancel,
            state: state_rx,
            adapter,
            join,
        })
    }

    async fn run(self) {
        let processor = Arc::new(MessageProcessor::new(
            self.bot.clone(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.services),
        ));
        let config = &self.services.worker;
        let mut lanes = Lanes::new(
            processor,
            config.max_concurrent_conversations,
            config.lane_capacity,
            config.lane_idle(),
        );

        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Ok(()),
                next = self.adapter.receive() => next,
            };
            match next {
                Ok(Some(message)) => lanes.dispatch(message).await,
                Ok(None) => {
                    break Err(ConnectionError::Fault(
                        "inbound message stream ended".into(),
                    ));
                }
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                self.state.send_replace(WorkerState::Draining);
                debug!(bot_id = %self.bot.id, lanes = lanes.active(), "draining");
                lanes.drain().await;
                if let Err(e) = self.adapter.disconnect().await {
                    warn!(bot_id = %self.bot.id, error = %e, "disconnect failed");
                }
                self.state.send_replace(WorkerState::Stopped);
                info!(bot_id = %self.bot.id, "bot worker stopped");
            }
            Err(error) => {
                self.state.send_replace(WorkerState::Faulted);
                lanes.abort();
                if let Err(e) = self.adapter.disconnect().await {
                    debug!(bot_id = %self.bot.id, error = %e, "disconnect after fault failed");
                }
                error!(bot_id = %self.bot.id, error = %error, "bot worker faulted");
                let report = FaultReport {
                    bot_id: self.bot.id.clone(),
                    generation: self.generation,
                    error,
                };
                if self.faults.send(report).is_err() {
                    debug!(bot_id = %self.bot.id, "supervisor gone, fault not reported");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_states() {
        assert!(WorkerState::Connecting.is_live());
        assert!(WorkerState::Running.is_live());
        assert!(WorkerState::Draining.is_live());
        assert!(!WorkerState::Stopped.is_live());
        assert!(!WorkerState::Faulted.is_live());
    }

    #[test]
    fn live_guard_counts_until_dropped() {
        let live = Arc::new(AtomicUsize::new(0));
        let first = LiveGuard::new(Arc::clone(&live));
        let second = LiveGuard::new(Arc::clone(&live));
        assert_eq!(live.load(Ordering::Relaxed), 2);
        drop(first);
        assert_eq!(live.load(Ordering::Relaxed), 1);
        drop(second);
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(WorkerState::Draining.to_string(), "draining");
        assert_eq!(
            serde_json::to_string(&WorkerState::Faulted).unwrap(),
            "\"faulted\""
        );
    }
}
