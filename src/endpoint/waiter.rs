//! Async waiting on endpoint signals.
//!
//! Endpoints never block. Readiness is observed through a watcher; this one
//! keeps the latest snapshot and wakes async tasks, which own the timeout.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::error::PipeError;
use super::signals::{HandleSignals, SignalsState};
use super::watchers::Watcher;

#[derive(Debug, Default)]
struct Observed {
    latest: Option<SignalsState>,
    closed: bool,
}

/// A [`Watcher`] that async tasks can await.
#[derive(Debug, Default)]
pub struct SignalWaiter {
    observed: Mutex<Observed>,
    notify: Notify,
}

impl SignalWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot delivered by the endpoint.
    pub fn latest(&self) -> Option<SignalsState> {
        self.observed.lock().latest
    }

    pub fn is_closed(&self) -> bool {
        self.observed.lock().closed
    }

    fn check(&self, signals: HandleSignals) -> Option<Result<SignalsState, PipeError>> {
        let observed = self.observed.lock();
        if observed.closed {
            return Some(Err(PipeError::Cancelled));
        }
        let state = observed.latest?;
        if state.satisfies_any(signals) {
            Some(Ok(state))
        } else if !state.can_satisfy_any(signals) {
            Some(Err(PipeError::precondition(format!(
                "signals {:?} can no longer be satisfied",
                signals
            ))))
        } else {
            None
        }
    }

    /// Wait until any of `signals` is satisfied.
    ///
    /// Fails `FailedPrecondition` once none of them can ever be satisfied,
    /// `Cancelled` if the endpoint closes and `DeadlineExceeded` on timeout.
    pub async fn wait_for(
        &self,
        signals: HandleSignals,
        timeout: Duration,
    ) -> Result<SignalsState, PipeError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a notification in between is not lost.
            notified.as_mut().enable();

            if let Some(result) = self.check(signals) {
                return result;
            }

            tokio::select! {
                _ = &mut notified => continue,
                _ = tokio::time::sleep_until(deadline) => {
                    return match self.check(signals) {
                        Some(result) => result,
                        None => Err(PipeError::DeadlineExceeded(timeout.as_millis() as u64)),
                    };
                }
            }
        }
    }
}

impl Watcher for SignalWaiter {
    fn on_signals_changed(&self, _context: u64, state: SignalsState) {
        self.observed.lock().latest = Some(state);
        self.notify.notify_waiters();
    }

    fn on_closed(&self, _context: u64) {
        self.observed.lock().closed = true;
        self.notify.notify_waiters();
    }
}
