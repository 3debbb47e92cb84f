use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};

/// Token carried by a reconnect wake-up; only the most recent one is honoured.
pub(crate) type Generation = u64;

struct Scheduled {
    generation: Generation,
    timer: AbortHandle,
}

/// The single outstanding reconnection attempt.
///
/// Scheduling aborts the previous timer before arming a new one, and a wake-up from a timer
/// that was replaced is rejected by [`accept`](Self::accept), so at most one attempt ever
/// fires per closure.
pub(crate) struct PendingReconnect {
    wake_tx: mpsc::UnboundedSender<Generation>,
    current: Option<Scheduled>,
    generation: Generation,
}

impl PendingReconnect {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Generation>) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let pending = Self {
            wake_tx,
            current: None,
            generation: 0,
        };
        (pending, wake_rx)
    }

    /// Arm a wake-up after `delay`, replacing any pending one.
    pub(crate) fn schedule(&mut self, delay: Duration) -> Generation {
        self.cancel();

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let wake_tx = self.wake_tx.clone();
        let deadline = Instant::now() + delay;
        let timer = tokio::spawn(async move {
            sleep_until(deadline).await;
            _ = wake_tx.send(generation);
        })
        .abort_handle();

        #[cfg(feature = "tracing")]
        tracing::debug!(generation, ?delay, "Reconnect scheduled");

        self.current = Some(Scheduled { generation, timer });
        generation
    }

    /// Abort the pending wake-up, if any. Returns whether one was pending.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(scheduled) => {
                scheduled.timer.abort();
                #[cfg(feature = "tracing")]
                tracing::debug!(generation = scheduled.generation, "Reconnect cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume a wake-up. Stale generations are ignored.
    pub(crate) fn accept(&mut self, generation: Generation) -> bool {
        match &self.current {
            Some(scheduled) if scheduled.generation == generation => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for PendingReconnect {
    fn drop(&mut self) {
        self.cancel();
    }
}
