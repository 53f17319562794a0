// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automatic restart policy for faulted workers.

use std::time::Duration;

use botfactory_config::model::SupervisorConfig;

/// Bounded exponential backoff between automatic restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RestartPolicy {
    /// Delay before restart number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether restart number `attempt` (1-based) may still happen.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && attempt <= self.max_attempts
    }
}

impl From<&SupervisorConfig> for RestartPolicy {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            enabled: config.restart_enabled,
            max_attempts: config.max_restart_attempts,
            initial_backoff: Duration::from_millis(config.restart_backoff_initial_ms),
            max_backoff: Duration::from_millis(config.restart_backoff_max_ms),
        }
    }
}
