//! Per-invocation diagnostic timer.
//!
//! When an invocation is still running shortly before the runtime's hard
//! deadline, the request is logged so that a killed invocation still leaves a
//! trace. The timer is tied to the invocation: dropping the guard cancels it.

use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::redact::redact_to_string;

/// Guard for a scheduled diagnostic log; aborts the task on drop.
#[derive(Debug)]
pub struct DiagnosticTimer {
    handle: JoinHandle<()>,
}

impl DiagnosticTimer {
    /// Logs the redacted `request` after `delay` unless disarmed first.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn arm(invocation_id: Uuid, delay: Duration, request: Value) -> Self {
        Self::arm_with(delay, move || {
            info!(
                invocation_id = %invocation_id,
                request = %redact_to_string(&request),
                "Logging the full request in case the runtime times out"
            );
        })
    }

    /// Runs `on_fire` after `delay` unless disarmed first.
    #[must_use]
    pub fn arm_with<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        Self { handle }
    }

    /// Cancels the timer; equivalent to dropping the guard.
    pub fn disarm(self) {}

    /// Whether the timer fired or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DiagnosticTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
