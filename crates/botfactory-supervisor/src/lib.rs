// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot lifecycle supervision for Botfactory.
//!
//! [`BotSupervisor`] keeps at most one worker per bot. Each worker owns a
//! platform adapter and routes inbound messages through the quota gate,
//! the conversation context and the AI responder before replying.
//! Messages of one conversation are processed strictly in order; distinct
//! conversations run concurrently up to a per-worker limit.

mod lanes;
mod processor;
pub mod restart;
pub mod services;
pub mod shutdown;
pub mod supervisor;
pub mod worker;

pub use restart::RestartPolicy;
pub use services::WorkerServices;
pub use shutdown::install_signal_handler;
pub use supervisor::{BotStatusReport, BotSupervisor, BroadcastReport};
pub use worker::WorkerState;
