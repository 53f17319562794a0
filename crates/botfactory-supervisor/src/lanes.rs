// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation lanes.
//!
//! Each conversation gets its own queue and task, so messages from one
//! end-user are handled strictly in order while different end-users are
//! served concurrently. A shared semaphore bounds how many messages of one
//! bot are processed at the same time. Lanes retire after an idle period and
//! release their conversation's context window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use botfactory_core::InboundMessage;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::SendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::processor::MessageProcessor;

struct Lane {
    tx: mpsc::Sender<InboundMessage>,
    task: JoinHandle<()>,
}

pub(crate) struct Lanes {
    processor: Arc<MessageProcessor>,
    permits: Arc<Semaphore>,
    capacity: usize,
    idle: Duration,
    lanes: HashMap<String, Lane>,
}

impl Lanes {
    pub(crate) fn new(
        processor: Arc<MessageProcessor>,
        max_concurrent: usize,
        capacity: usize,
        idle: Duration,
    ) -> Self {
        Self {
            processor,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            capacity: capacity.max(1),
            idle,
            lanes: HashMap::new(),
        }
    }

    /// Queues `message` on its conversation's lane, waiting while the lane
    /// is full.
    pub(crate) async fn dispatch(&mut self, message: InboundMessage) {
        let key = message.external_user_id.clone();
        let message = match self.lanes.get(&key) {
            Some(lane) => match lane.tx.send(message).await {
                Ok(()) => return,
                // The lane retired between messages.
                Err(SendError(message)) => message,
            },
            None => message,
        };

        // A retiring lane may still be finishing its last messages; the new
        // lane waits for it so order is kept.
        let previous = self.lanes.remove(&key).map(|lane| lane.task);
        self.lanes.retain(|_, lane| !lane.task.is_finished());

        let (tx, rx) = mpsc::channel(self.capacity);
        if tx.try_send(message).is_err() {
            warn!(conversation = %key, "new lane rejected its first message");
        }
        let task = tokio::spawn(run_lane(
            key.clone(),
            Arc::clone(&self.processor),
            Arc::clone(&self.permits),
            rx,
            self.idle,
            previous,
        ));
        self.lanes.insert(key, Lane { tx, task });
    }

    /// Number of lanes that have not retired.
    pub(crate) fn active(&self) -> usize {
        self.lanes
            .values()
            .filter(|lane| !lane.task.is_finished())
            .count()
    }

    /// Closes every lane and waits until their queued messages are handled.
    pub(crate) async fn drain(self) {
        let tasks: Vec<JoinHandle<()>> = self
            .lanes
            .into_values()
            .map(|lane| {
                drop(lane.tx);
                lane.task
            })
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "conversation lane failed");
            }
        }
    }

    /// Stops every lane immediately, discarding queued messages.
    pub(crate) fn abort(self) {
        for lane in self.lanes.into_values() {
            lane.task.abort();
        }
    }
}

async fn run_lane(
    external_user_id: String,
    processor: Arc<MessageProcessor>,
    permits: Arc<Semaphore>,
    mut rx: mpsc::Receiver<InboundMessage>,
    idle: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous
        && let Err(e) = previous.await
    {
        debug!(error = %e, "previous lane ended abnormally");
    }

    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(message)) => process(&processor, &permits, message).await,
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Some(message) = rx.recv().await {
                    process(&processor, &permits, message).await;
                }
                processor.retire(&external_user_id);
                break;
            }
        }
    }
}

async fn process(processor: &MessageProcessor, permits: &Semaphore, message: InboundMessage) {
    let Ok(_permit) = permits.acquire().await else {
        return;
    };
    processor.handle(message).await;
}
