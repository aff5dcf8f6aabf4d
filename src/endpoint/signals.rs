//! Handle signals derived from transport slot status.

use bitflags::bitflags;

use super::quota::QuotaLimits;
use crate::transport::SlotStatus;

bitflags! {
    /// Signals observable on a message pipe endpoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HandleSignals: u32 {
        /// At least one message is queued for reading.
        const READABLE = 1 << 0;
        /// The peer is open, so writes can succeed.
        const WRITABLE = 1 << 1;
        /// The peer endpoint has been closed.
        const PEER_CLOSED = 1 << 2;
        /// The peer lives in another process.
        const PEER_REMOTE = 1 << 4;
        /// A receive quota is currently exceeded.
        const QUOTA_EXCEEDED = 1 << 5;
    }
}

impl Default for HandleSignals {
    fn default() -> Self {
        Self::empty()
    }
}

/// Immutable snapshot of which signals are true now and which may become true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalsState {
    pub satisfied: HandleSignals,
    pub satisfiable: HandleSignals,
}

impl SignalsState {
    pub fn new(satisfied: HandleSignals, satisfiable: HandleSignals) -> Self {
        Self {
            satisfied,
            satisfiable,
        }
    }

    /// True if any of `signals` is satisfied.
    pub fn satisfies_any(&self, signals: HandleSignals) -> bool {
        self.satisfied.intersects(signals)
    }

    /// True if all of `signals` are satisfied.
    pub fn satisfies_all(&self, signals: HandleSignals) -> bool {
        self.satisfied.contains(signals)
    }

    /// True if any of `signals` may still become satisfied.
    pub fn can_satisfy_any(&self, signals: HandleSignals) -> bool {
        self.satisfiable.intersects(signals)
    }

    pub fn is_empty(&self) -> bool {
        self.satisfied.is_empty() && self.satisfiable.is_empty()
    }
}

/// Compute the signals state for a slot.
///
/// `None` status (slot in transit, transferred or closed) yields the empty
/// state: nothing is satisfiable.
pub fn compute(status: Option<&SlotStatus>, quota: &QuotaLimits) -> SignalsState {
    let Some(status) = status else {
        return SignalsState::default();
    };

    let mut state = SignalsState::default();
    if status.has_messages {
        state.satisfied |= HandleSignals::READABLE;
        state.satisfiable |= HandleSignals::READABLE;
    }
    if status.receiving_messages {
        state.satisfiable |= HandleSignals::READABLE;
    }
    if !status.peer_closed {
        state.satisfied |= HandleSignals::WRITABLE;
        state.satisfiable |=
            HandleSignals::WRITABLE | HandleSignals::READABLE | HandleSignals::PEER_REMOTE;
        if status.peer_remote {
            state.satisfied |= HandleSignals::PEER_REMOTE;
        }
    } else {
        state.satisfied |= HandleSignals::PEER_CLOSED;
    }
    if quota.is_exceeded(status) {
        state.satisfied |= HandleSignals::QUOTA_EXCEEDED;
    }
    state.satisfiable |= HandleSignals::PEER_CLOSED | HandleSignals::QUOTA_EXCEEDED;
    state
}
