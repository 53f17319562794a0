// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot lifecycle supervision.
//!
//! The supervisor owns one slot per bot. Every lifecycle operation on a bot
//! holds that slot's lock for its whole duration, so concurrent start/stop
//! calls for the same bot serialize while different bots proceed
//! independently. Faults from running workers arrive over a channel and
//! are handled by a background recovery loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use botfactory_analytics::AnalyticsReport;
use botfactory_config::model::SupervisorConfig;
use botfactory_core::{
    AdapterFactory, Bot, BotFactoryError, BotId, BotStatus, ConversationKey, NewMessage, Role,
    UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::restart::RestartPolicy;
use crate::services::WorkerServices;
use crate::worker::{BotWorker, FaultReport, WorkerHandle, WorkerState};

#[derive(Default)]
struct Slot {
    worker: Option<WorkerHandle>,
    restart_attempts: u32,
    pending_restart: Option<JoinHandle<()>>,
    last_error: Option<String>,
}

impl Slot {
    fn cancel_pending_restart(&mut self) {
        if let Some(pending) = self.pending_restart.take() {
            pending.abort();
        }
    }

    /// A manual lifecycle operation takes over from the restart policy.
    fn reset_recovery(&mut self) {
        self.cancel_pending_restart();
        self.restart_attempts = 0;
    }

    fn live_worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref().filter(|worker| worker.is_live())
    }
}

/// Persisted status of a bot together with its live worker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotStatusReport {
    pub bot_id: BotId,
    pub status: BotStatus,
    pub worker: Option<WorkerState>,
    pub restart_attempts: u32,
    pub restart_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_active: Option<DateTime<Utc>>,
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub total_targets: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Registry of bot workers.
pub struct BotSupervisor {
    services: Arc<WorkerServices>,
    factory: Arc<dyn AdapterFactory>,
    config: SupervisorConfig,
    policy: RestartPolicy,
    slots: DashMap<BotId, Arc<Mutex<Slot>>>,
    faults: mpsc::UnboundedSender<FaultReport>,
    generation: AtomicU64,
    /// Worker tasks currently alive, readable without any slot lock.
    live: Arc<AtomicUsize>,
    closing: CancellationToken,
}

impl BotSupervisor {
    /// Creates the supervisor and starts its recovery loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        services: Arc<WorkerServices>,
        factory: Arc<dyn AdapterFactory>,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let (faults, fault_rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(Self {
            services,
            factory,
            policy: RestartPolicy::from(&config),
            config,
            slots: DashMap::new(),
            faults,
            generation: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            closing: CancellationToken::new(),
        });
        tokio::spawn(recovery_loop(Arc::downgrade(&supervisor), fault_rx));
        supervisor
    }

    pub fn services(&self) -> &Arc<WorkerServices> {
        &self.services
    }

    fn slot(&self, id: &BotId) -> Arc<Mutex<Slot>> {
        Arc::clone(self.slots.entry(id.clone()).or_default().value())
    }

    fn existing_slot(&self, id: &BotId) -> Option<Arc<Mutex<Slot>>> {
        self.slots.get(id).map(|slot| Arc::clone(slot.value()))
    }

    fn ensure_open(&self) -> Result<(), BotFactoryError> {
        if self.closing.is_cancelled() {
            return Err(BotFactoryError::Internal(
                "supervisor is shutting down".into(),
            ));
        }
        Ok(())
    }

    /// Starts the bot's worker. Starting a running bot changes nothing.
    pub async fn start(&self, id: &BotId) -> Result<BotStatusReport, BotFactoryError> {
        self.ensure_open()?;
        let slot = self.slot(id);
        let mut slot = slot.lock().await;
        slot.reset_recovery();
        self.start_locked(id, &mut slot).await?;
        self.report(id, &slot).await
    }

    /// Stops the bot's worker, draining in-flight messages, and marks the
    /// bot INACTIVE.
    pub async fn stop(&self, id: &BotId) -> Result<BotStatusReport, BotFactoryError> {
        let slot = self.slot(id);
        let mut slot = slot.lock().await;
        let bot = self.load_bot(id).await?;
        if !bot.status.can_transition_to(BotStatus::Inactive) {
            return Err(BotFactoryError::InvalidState {
                bot_id: id.clone(),
                status: bot.status,
                action: "stop",
            });
        }
        slot.reset_recovery();
        self.stop_worker(id, &mut slot).await;
        self.services
            .store
            .set_bot_status(id, BotStatus::Inactive)
            .await?;
        info!(bot_id = %id, "bot stopped");
        self.report(id, &slot).await
    }

    /// Stops the worker if one runs, then starts a fresh one.
    pub async fn restart(&self, id: &BotId) -> Result<BotStatusReport, BotFactoryError> {
        self.ensure_open()?;
        let slot = self.slot(id);
        let mut slot = slot.lock().await;
        self.load_bot(id).await?;
        slot.reset_recovery();
        self.stop_worker(id, &mut slot).await;
        self.start_locked(id, &mut slot).await?;
        info!(bot_id = %id, "bot restarted");
        self.report(id, &slot).await
    }

    pub async fn status(&self, id: &BotId) -> Result<BotStatusReport, BotFactoryError> {
        match self.existing_slot(id) {
            Some(slot) => {
                let slot = slot.lock().await;
                self.report(id, &slot).await
            }
            None => self.report(id, &Slot::default()).await,
        }
    }

    /// Deletes an INACTIVE bot with its conversations and analytics.
    pub async fn delete(&self, id: &BotId) -> Result<(), BotFactoryError> {
        let slot = self.slot(id);
        let mut slot = slot.lock().await;
        let bot = self.load_bot(id).await?;
        if !bot.status.is_deletable() || slot.live_worker().is_some() {
            return Err(BotFactoryError::InvalidState {
                bot_id: id.clone(),
                status: bot.status,
                action: "delete",
            });
        }
        slot.reset_recovery();
        self.services.store.delete_bot(id).await?;
        self.services.context.forget_bot(id);
        drop(slot);
        self.slots.remove(id);
        info!(bot_id = %id, "bot deleted");
        Ok(())
    }

    /// Sends `text` to every conversation of a running bot, or only to the
    /// listed external user ids.
    pub async fn broadcast(
        &self,
        id: &BotId,
        text: &str,
        targets: Option<&[String]>,
    ) -> Result<BroadcastReport, BotFactoryError> {
        let adapter = {
            let slot = self.slot(id);
            let slot = slot.lock().await;
            let bot = self.load_bot(id).await?;
            match slot.live_worker() {
                Some(worker) => worker.adapter(),
                None => {
                    return Err(BotFactoryError::InvalidState {
                        bot_id: id.clone(),
                        status: bot.status,
                        action: "broadcast",
                    });
                }
            }
        };

        let conversations: Vec<_> = self
            .services
            .store
            .list_conversations(id)
            .await?
            .into_iter()
            .filter(|c| targets.is_none_or(|t| t.contains(&c.external_user_id)))
            .collect();

        let mut report = BroadcastReport {
            total_targets: conversations.len(),
            ..BroadcastReport::default()
        };
        for conversation in conversations {
            if let Err(e) = adapter.send(&conversation.external_user_id, text).await {
                report.failed += 1;
                report
                    .errors
                    .push(format!("User {}: {}", conversation.external_user_id, e.message));
                warn!(bot_id = %id, error = %e, "broadcast delivery failed");
                continue;
            }
            report.successful += 1;

            let message = NewMessage::new(conversation.id.clone(), Role::Assistant, text, Utc::now());
            match self.services.store.append_message(message).await {
                Ok(stored) => {
                    let key = ConversationKey::new(id.clone(), conversation.external_user_id);
                    if self.services.context.contains(&key) {
                        self.services.context.append(&key, stored);
                    }
                }
                Err(e) => error!(bot_id = %id, error = %e, "failed to persist broadcast message"),
            }
        }
        info!(
            bot_id = %id,
            total = report.total_targets,
            successful = report.successful,
            failed = report.failed,
            "broadcast finished"
        );
        Ok(report)
    }

    /// Daily usage buckets of the bot from `since` onwards, with totals.
    pub async fn analytics(
        &self,
        id: &BotId,
        since: Option<NaiveDate>,
    ) -> Result<AnalyticsReport, BotFactoryError> {
        self.load_bot(id).await?;
        AnalyticsReport::load(self.services.store.as_ref(), id, since).await
    }

    /// Starts every bot persisted as ACTIVE. Returns how many came up.
    ///
    /// If an owner has more ACTIVE bots than their tier now allows, the
    /// oldest ones are kept and the rest are marked INACTIVE.
    pub async fn resume(&self) -> Result<usize, BotFactoryError> {
        let bots = self
            .services
            .store
            .list_bots(Some(BotStatus::Active))
            .await?;
        let mut kept: HashMap<UserId, u32> = HashMap::new();
        let mut resumable = Vec::with_capacity(bots.len());
        for bot in bots {
            let limit = self
                .services
                .gate
                .limits_for(&bot.owner)
                .await?
                .max_active_bots;
            let count = kept.entry(bot.owner.clone()).or_default();
            if limit.is_some_and(|limit| *count >= limit) {
                warn!(
                    bot_id = %bot.id,
                    owner = %bot.owner,
                    "active bot limit lowered, deactivating bot"
                );
                if let Err(e) = self
                    .services
                    .store
                    .set_bot_status(&bot.id, BotStatus::Inactive)
                    .await
                {
                    error!(bot_id = %bot.id, error = %e, "failed to deactivate bot");
                }
                continue;
            }
            *count += 1;
            resumable.push(bot);
        }

        let mut started = 0;
        for bot in resumable {
            match self.start(&bot.id).await {
                Ok(_) => started += 1,
                Err(e) => warn!(bot_id = %bot.id, error = %e, "failed to resume bot"),
            }
        }
        info!(started, "resumed active bots");
        Ok(started)
    }

    /// Stops every worker concurrently, each bounded by the shutdown
    /// timeout. Persisted statuses are kept so bots resume on next start.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        let slots: Vec<(BotId, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        let timeout = self.config.shutdown_timeout();

        futures::future::join_all(slots.into_iter().map(|(id, slot)| async move {
            let mut slot = slot.lock().await;
            slot.cancel_pending_restart();
            if let Some(worker) = slot.worker.take()
                && !worker.stop(timeout).await
            {
                warn!(bot_id = %id, "worker did not drain before the shutdown timeout");
            }
        }))
        .await;
        info!("all bot workers stopped");
    }

    /// Number of live workers. Never waits on a bot's lifecycle operation.
    pub fn running(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    async fn load_bot(&self, id: &BotId) -> Result<Bot, BotFactoryError> {
        self.services
            .store
            .get_bot(id)
            .await?
            .ok_or_else(|| BotFactoryError::BotNotFound(id.clone()))
    }

    async fn start_locked(&self, id: &BotId, slot: &mut Slot) -> Result<(), BotFactoryError> {
        if slot.live_worker().is_some() {
            debug!(bot_id = %id, "bot already running");
            return Ok(());
        }
        // A finished worker whose fault has not been handled yet.
        if let Some(stale) = slot.worker.take() {
            stale.stop(self.config.shutdown_timeout()).await;
        }

        let bot = self.load_bot(id).await?;
        let gate = &self.services.gate;
        gate.can_activate(&bot).await?.into_result()?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let adapter = self.factory.create(&bot);
        let worker = match BotWorker::start(
            bot.clone(),
            adapter,
            Arc::clone(&self.services),
            self.faults.clone(),
            generation,
            Arc::clone(&self.live),
        )
        .await
        {
            Ok(worker) => worker,
            Err(e) => {
                slot.last_error = Some(e.to_string());
                self.services
                    .store
                    .set_bot_status(id, BotStatus::Inactive)
                    .await?;
                return Err(e.into());
            }
        };

        // The pre-check may have lost a race with another start of the
        // same owner; the store decides.
        let activated = match gate.activate(&bot).await {
            Ok(decision) => decision.into_result(),
            Err(e) => Err(e),
        };
        if let Err(e) = activated {
            info!(bot_id = %id, error = %e, "activation refused after connect, disconnecting");
            worker.stop(self.config.shutdown_timeout()).await;
            slot.last_error = Some(e.to_string());
            return Err(e);
        }
        slot.worker = Some(worker);
        slot.last_error = None;
        Ok(())
    }

    async fn stop_worker(&self, id: &BotId, slot: &mut Slot) {
        if let Some(worker) = slot.worker.take()
            && !worker.stop(self.config.shutdown_timeout()).await
        {
            warn!(bot_id = %id, "worker did not drain in time and was aborted");
        }
    }

    async fn report(&self, id: &BotId, slot: &Slot) -> Result<BotStatusReport, BotFactoryError> {
        let bot = self.load_bot(id).await?;
        Ok(BotStatusReport {
            bot_id: bot.id,
            status: bot.status,
            worker: slot.worker.as_ref().map(WorkerHandle::state),
            restart_attempts: slot.restart_attempts,
            restart_pending: slot
                .pending_restart
                .as_ref()
                .is_some_and(|pending| !pending.is_finished()),
            last_error: slot.last_error.clone(),
            last_active: bot.last_active,
        })
    }

    async fn handle_fault(self: &Arc<Self>, report: FaultReport) {
        let Some(slot) = self.existing_slot(&report.bot_id) else {
            return;
        };
        let mut slot = slot.lock().await;
        if slot
            .worker
            .as_ref()
            .is_none_or(|worker| worker.generation != report.generation)
        {
            debug!(bot_id = %report.bot_id, "ignoring fault of a replaced worker");
            return;
        }
        self.stop_worker(&report.bot_id, &mut slot).await;
        slot.last_error = Some(report.error.to_string());
        metrics::counter!("botfactory_worker_faults_total").increment(1);

        if let Err(e) = self
            .services
            .store
            .set_bot_status(&report.bot_id, BotStatus::Inactive)
            .await
        {
            error!(bot_id = %report.bot_id, error = %e, "failed to mark faulted bot inactive");
        }
        self.schedule_restart(&report.bot_id, &mut slot);
    }

    fn schedule_restart(self: &Arc<Self>, id: &BotId, slot: &mut Slot) {
        if self.closing.is_cancelled() {
            return;
        }
        let attempt = slot.restart_attempts + 1;
        if !self.policy.allows(attempt) {
            if self.policy.enabled {
                warn!(
                    bot_id = %id,
                    attempts = slot.restart_attempts,
                    "automatic restarts exhausted, manual start required"
                );
            }
            return;
        }
        slot.restart_attempts = attempt;
        let delay = self.policy.delay(attempt);
        info!(
            bot_id = %id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling automatic restart"
        );

        let supervisor = Arc::downgrade(self);
        let id = id.clone();
        slot.cancel_pending_restart();
        slot.pending_restart = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(supervisor) = supervisor.upgrade() {
                supervisor.restart_after_fault(&id).await;
            }
        }));
    }

    async fn restart_after_fault(self: &Arc<Self>, id: &BotId) {
        let Some(slot) = self.existing_slot(id) else {
            return;
        };
        let mut slot = slot.lock().await;
        // This task is the pending restart; release its handle.
        slot.pending_restart = None;
        if self.closing.is_cancelled() {
            return;
        }
        match self.start_locked(id, &mut slot).await {
            Ok(()) => {
                metrics::counter!("botfactory_worker_restarts_total").increment(1);
                info!(bot_id = %id, attempt = slot.restart_attempts, "bot restarted after fault");
            }
            Err(BotFactoryError::BotNotFound(_)) => {}
            Err(e) => {
                warn!(bot_id = %id, attempt = slot.restart_attempts, error = %e, "automatic restart failed");
                self.schedule_restart(id, &mut slot);
            }
        }
    }
}

async fn recovery_loop(supervisor: Weak<BotSupervisor>, mut faults: mpsc::UnboundedReceiver<FaultReport>) {
    while let Some(report) = faults.recv().await {
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        supervisor.handle_fault(report).await;
    }
    debug!("recovery loop stopped");
}
