//! Reconnect scheduling.
//!
//! [`Backoff`] tracks the attempt counter for the connection driver. The
//! delay curve itself lives on [`ReconnectConfig`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::ReconnectConfig;

/// Attempt counter plus delay policy.
///
/// The counter grows by one for every scheduled retry and drops back to zero
/// only when a connection opens.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay for the current attempt, then advances the counter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.config.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub(crate) fn reset(&mut self) {
        if self.attempt != 0 {
            debug!(attempts = self.attempt, "backoff reset");
        }
        self.attempt = 0;
    }

    /// Number of retries scheduled since the last successful open.
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
