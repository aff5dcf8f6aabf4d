//! Message pipe endpoint: one side of a bidirectional, ordered pipe.
//!
//! An `Endpoint` observes one slot of the routing transport. It tracks its
//! lifecycle (open, in transit, closed), folds quotas into its signals state
//! and pushes state changes to registered watchers.
//!
//! # Locking
//!
//! Every mutable field sits behind one `parking_lot::Mutex`. Calls that may
//! take broader transport locks and then call back into observers (`send`,
//! `receive`, `close_port_slot`, `merge_local_ports`) are issued with the
//! endpoint lock released.

mod error;
mod quota;
mod signals;
mod waiter;
mod watchers;
pub mod wire;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, enabled, trace, Level};

use crate::config::EndpointConfig;
use crate::telemetry::{self, EndpointSpan, SpanExt};
use crate::transport::{
    Message, MessageFilter, PortName, RoutingTransport, SlotObserver, SlotRef, TransportError,
};

pub use error::{result_code, PipeError, ResultCode};
pub use quota::{QuotaKind, QuotaLimits, QuotaRequest, QuotaUsage, QUOTA_LIMIT_NONE};
pub use signals::{HandleSignals, SignalsState};
pub use waiter::SignalWaiter;
pub use watchers::{Watcher, WatcherSet};

/// Lifecycle state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointState {
    Open,
    /// Frozen while a transfer is attempted.
    InTransit,
    ClosedLocal,
    /// Closed because the slot moved elsewhere; the slot is not released here.
    ClosedTransferred,
}

impl EndpointState {
    pub fn is_closed(self) -> bool {
        matches!(self, Self::ClosedLocal | Self::ClosedTransferred)
    }
}

struct Inner {
    slot: SlotRef,
    state: EndpointState,
    quota: QuotaLimits,
    watchers: WatcherSet,
    local_peer: Weak<Endpoint>,
    /// Whether the last computed snapshot had QUOTA_EXCEEDED set.
    quota_tripped: bool,
}

/// One end of a message pipe.
pub struct Endpoint {
    transport: Arc<dyn RoutingTransport>,
    pipe_id: u64,
    side: i8,
    this: Weak<Endpoint>,
    inner: Mutex<Inner>,
}

/// Peek filter that never matches; remembers the size of the head message.
#[derive(Default)]
struct PeekSize {
    size: u64,
}

impl MessageFilter for PeekSize {
    fn matches(&mut self, message: &Message) -> bool {
        self.size = message.num_bytes();
        false
    }
}

impl Endpoint {
    /// Create an open endpoint bound to `slot`, observing it on `transport`.
    pub fn new(
        transport: Arc<dyn RoutingTransport>,
        slot: SlotRef,
        pipe_id: u64,
        side: i8,
    ) -> Arc<Self> {
        Self::with_quota(transport, slot, pipe_id, side, QuotaLimits::default())
    }

    /// Like [`Endpoint::new`], with initial quotas taken from `config`.
    pub fn with_config(
        transport: Arc<dyn RoutingTransport>,
        slot: SlotRef,
        pipe_id: u64,
        side: i8,
        config: &EndpointConfig,
    ) -> Arc<Self> {
        let quota = QuotaLimits {
            receive_length_limit: config.receive_length_limit,
            receive_bytes_limit: config.receive_bytes_limit,
        };
        Self::with_quota(transport, slot, pipe_id, side, quota)
    }

    /// Create an open endpoint on the default slot of `port`.
    pub fn from_port(
        transport: Arc<dyn RoutingTransport>,
        port: PortName,
        pipe_id: u64,
        side: i8,
    ) -> Result<Arc<Self>, PipeError> {
        let slot = transport
            .get_port(port)
            .map_err(|e| PipeError::invalid(format!("port {}: {}", port, e)))?;
        Ok(Self::new(transport, slot, pipe_id, side))
    }

    fn with_quota(
        transport: Arc<dyn RoutingTransport>,
        slot: SlotRef,
        pipe_id: u64,
        side: i8,
        quota: QuotaLimits,
    ) -> Arc<Self> {
        debug!(pipe_id, side, slot = %slot, "creating message pipe endpoint");
        let endpoint = Arc::new_cyclic(|this| Self {
            transport,
            pipe_id,
            side,
            this: this.clone(),
            inner: Mutex::new(Inner {
                slot,
                state: EndpointState::Open,
                quota,
                watchers: WatcherSet::new(),
                local_peer: Weak::new(),
                quota_tripped: false,
            }),
        });
        endpoint
            .transport
            .set_observer(slot, Some(endpoint.slot_observer()));
        endpoint
    }

    pub fn pipe_id(&self) -> u64 {
        self.pipe_id
    }

    pub fn side(&self) -> i8 {
        self.side
    }

    pub fn transport(&self) -> &Arc<dyn RoutingTransport> {
        &self.transport
    }

    pub fn state(&self) -> EndpointState {
        self.inner.lock().state
    }

    pub fn slot(&self) -> SlotRef {
        self.inner.lock().slot
    }

    /// Observer handed to the transport. Holds only a weak reference so a
    /// late callback cannot keep the endpoint alive.
    fn slot_observer(&self) -> SlotObserver {
        let this = self.this.clone();
        Arc::new(move || {
            if let Some(endpoint) = this.upgrade() {
                endpoint.on_slot_status_changed();
            }
        })
    }

    fn signals_state_locked(&self, inner: &mut Inner) -> SignalsState {
        // A closed endpoint no longer owns its slot, even if the slot lives on.
        if inner.state.is_closed() {
            return SignalsState::default();
        }
        let status = self.transport.status(inner.slot);
        debug_assert!(
            status.is_some() || inner.state != EndpointState::Open,
            "open endpoint lost its slot"
        );
        let state = signals::compute(status.as_ref(), &inner.quota);
        let tripped = state.satisfies_any(HandleSignals::QUOTA_EXCEEDED);
        if tripped && !inner.quota_tripped {
            telemetry::record_quota_exceeded();
        }
        inner.quota_tripped = tripped;
        state
    }

    /// Current signals snapshot. Empty once closed.
    pub fn signals_state(&self) -> SignalsState {
        let mut inner = self.inner.lock();
        self.signals_state_locked(&mut inner)
    }

    fn open_slot(&self, op: &str) -> Result<SlotRef, PipeError> {
        let inner = self.inner.lock();
        match inner.state {
            EndpointState::Open => Ok(inner.slot),
            state => Err(PipeError::invalid(format!("cannot {} endpoint in state {:?}", op, state))),
        }
    }

    /// Close the endpoint and release its slot.
    pub fn close(&self) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        debug!(pipe_id = self.pipe_id, side = self.side, slot = %inner.slot, "closing message pipe");
        if inner.state != EndpointState::Open {
            return Err(PipeError::invalid(format!("cannot close endpoint in state {:?}", inner.state)));
        }
        inner.state = EndpointState::ClosedLocal;
        inner.watchers.notify_closed();
        inner.local_peer = Weak::new();
        let slot = inner.slot;
        drop(inner);

        self.transport.close_port_slot(slot);
        Ok(())
    }

    /// Send `message` to the peer.
    ///
    /// # Panics
    ///
    /// Panics if the transport answers outside its send contract.
    pub fn write(&self, message: Message) -> Result<(), PipeError> {
        let slot = self.open_slot("write to")?;
        let bytes = message.num_bytes();
        let result = self.transport.send(slot, message);
        trace!(pipe_id = self.pipe_id, side = self.side, slot = %slot, bytes, ?result, "sent message");

        match result {
            Ok(()) => {
                telemetry::record_message_written(bytes);
                Ok(())
            }
            Err(e) => {
                telemetry::record_write_failure();
                match e {
                    TransportError::PortUnknown
                    | TransportError::PortStateUnexpected
                    | TransportError::CannotSendToPeer => Err(PipeError::InvalidArgument(e.to_string())),
                    TransportError::PeerClosed => Err(PipeError::precondition("peer closed")),
                    other => unreachable!("transport send returned {:?} on slot {}", other, slot),
                }
            }
        }
    }

    /// Take the next queued message without blocking.
    ///
    /// Returns `ShouldWait` when nothing is queued yet, and
    /// `FailedPrecondition` once the peer is closed and the queue drained.
    ///
    /// # Panics
    ///
    /// Panics if the transport answers outside its receive contract.
    pub fn read(&self) -> Result<Message, PipeError> {
        let slot = self.open_slot("read from")?;

        let message = match self.transport.receive(slot, None) {
            Ok(Some(message)) => message,
            Ok(None) => return Err(PipeError::ShouldWait),
            Err(TransportError::PeerClosed) => {
                return Err(PipeError::precondition("peer closed and no messages remain"))
            }
            Err(e @ (TransportError::PortUnknown | TransportError::PortStateUnexpected)) => {
                return Err(PipeError::InvalidArgument(e.to_string()))
            }
            Err(other) => unreachable!("transport receive returned {:?} on slot {}", other, slot),
        };
        telemetry::record_message_read(message.num_bytes());

        // Draining may have flipped READABLE off.
        let mut inner = self.inner.lock();
        let state = self.signals_state_locked(&mut inner);
        inner.watchers.notify_state(state);
        Ok(message)
    }

    pub fn set_quota(&self, request: QuotaRequest) {
        let mut inner = self.inner.lock();
        inner.quota.apply(request);
    }

    /// Set a quota from a raw kind code.
    pub fn set_quota_raw(&self, kind: u32, limit: u64) -> Result<(), PipeError> {
        let kind = QuotaKind::try_from(kind)?;
        self.set_quota(QuotaRequest { kind, limit });
        Ok(())
    }

    pub fn query_quota(&self, kind: QuotaKind) -> Result<QuotaUsage, PipeError> {
        let inner = self.inner.lock();
        if inner.state.is_closed() {
            return Err(PipeError::invalid(format!("cannot query quota in state {:?}", inner.state)));
        }
        let Some(status) = self.transport.status(inner.slot) else {
            debug_assert!(inner.state != EndpointState::Open);
            return Err(PipeError::invalid("slot status unavailable"));
        };
        Ok(inner.quota.usage(kind, &status))
    }

    pub fn query_quota_raw(&self, kind: u32) -> Result<QuotaUsage, PipeError> {
        self.query_quota(QuotaKind::try_from(kind)?)
    }

    /// Register `watcher`; it immediately receives the current snapshot.
    pub fn add_watcher(&self, watcher: Arc<dyn Watcher>, context: u64) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        if inner.state != EndpointState::Open {
            return Err(PipeError::invalid("cannot watch a closed or in-transit endpoint"));
        }
        let state = self.signals_state_locked(&mut inner);
        inner.watchers.add(watcher, context, state)
    }

    pub fn remove_watcher(&self, watcher: &Arc<dyn Watcher>, context: u64) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        if inner.state != EndpointState::Open {
            return Err(PipeError::invalid("cannot unwatch a closed or in-transit endpoint"));
        }
        inner
            .watchers
            .remove(watcher, context)
            .map_err(|_| PipeError::invalid("watcher not registered"))
    }

    /// Freeze the endpoint for transfer. Returns false if it is already in
    /// transit or closed.
    pub fn begin_transit(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != EndpointState::Open {
            return false;
        }
        inner.state = EndpointState::InTransit;
        debug!(pipe_id = self.pipe_id, side = self.side, "endpoint in transit");
        true
    }

    /// Finish a transfer. The slot now belongs to whoever deserializes the
    /// record and is not released.
    ///
    /// This detaches the slot observer, so on a shared transport it must run
    /// before the record is deserialized.
    pub fn complete_transit_and_close(&self) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        if inner.state != EndpointState::InTransit {
            return Err(PipeError::invalid(format!("no transit to complete in state {:?}", inner.state)));
        }
        self.transport.set_observer(inner.slot, None);
        inner.state = EndpointState::ClosedTransferred;
        inner.watchers.notify_closed();
        inner.local_peer = Weak::new();
        drop(inner);

        debug!(pipe_id = self.pipe_id, side = self.side, "endpoint transferred");
        Ok(())
    }

    /// Abort a transfer and resume normal operation.
    pub fn cancel_transit(&self) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        if inner.state != EndpointState::InTransit {
            return Err(PipeError::invalid(format!("no transit to cancel in state {:?}", inner.state)));
        }
        inner.state = EndpointState::Open;
        debug!(pipe_id = self.pipe_id, side = self.side, "endpoint transit cancelled");

        // Conditions may have changed while frozen.
        let state = self.signals_state_locked(&mut inner);
        inner.watchers.notify_state(state);
        Ok(())
    }

    /// Detach from the transport and mark closed without releasing the slot.
    ///
    /// Returns `None` for a transferred endpoint: its slot belongs to the
    /// endpoint that was deserialized from it and is left untouched.
    fn revoke_for_fuse(&self) -> Option<SlotRef> {
        let mut inner = self.inner.lock();
        inner.watchers.notify_closed();
        inner.local_peer = Weak::new();
        if inner.state == EndpointState::ClosedTransferred {
            return None;
        }
        self.transport.set_observer(inner.slot, None);
        inner.state = EndpointState::ClosedLocal;
        Some(inner.slot)
    }

    /// Merge this endpoint's slot with `other`'s into a direct link.
    ///
    /// Both endpoints are closed whatever the outcome; only the merge itself
    /// is conditional on both slots being default slots.
    pub fn fuse(&self, other: &Endpoint) -> Result<(), PipeError> {
        let span = EndpointSpan::new("fuse", self.pipe_id, self.side);
        let _guard = span.enter();

        let slot0 = self.revoke_for_fuse();
        let slot1 = other.revoke_for_fuse();

        let result = match (slot0, slot1) {
            (Some(slot0), Some(slot1)) => self.merge_slots(slot0, slot1),
            _ => Err(PipeError::invalid("cannot fuse a transferred endpoint")),
        };
        debug!(pipe_id = self.pipe_id, ok = result.is_ok(), "fused endpoints");
        span.record_result(&result);
        telemetry::record_fuse(result.is_ok());
        result
    }

    fn merge_slots(&self, slot0: SlotRef, slot1: SlotRef) -> Result<(), PipeError> {
        if !slot0.is_default() || !slot1.is_default() {
            Err(PipeError::invalid("cannot fuse a secondary slot"))
        } else {
            self.transport
                .merge_local_ports(slot0.port, slot1.port)
                .map_err(|e| PipeError::precondition(format!("merge failed: {}", e)))
        }
    }

    /// Move the endpoint onto `slot`, re-observing and re-evaluating signals.
    ///
    /// Fails on a closed endpoint, which must not touch any slot again.
    pub fn rebind(&self, slot: SlotRef) -> Result<(), PipeError> {
        let mut inner = self.inner.lock();
        if inner.state.is_closed() {
            return Err(PipeError::invalid(format!("cannot rebind endpoint in state {:?}", inner.state)));
        }
        self.transport.set_observer(inner.slot, None);
        debug!(pipe_id = self.pipe_id, side = self.side, from = %inner.slot, to = %slot, "rebinding endpoint");
        inner.slot = slot;
        self.transport.set_observer(slot, Some(self.slot_observer()));
        let state = self.signals_state_locked(&mut inner);
        inner.watchers.notify_state(state);
        Ok(())
    }

    pub fn local_peer(&self) -> Option<Arc<Endpoint>> {
        self.inner.lock().local_peer.upgrade()
    }

    /// Cache the other end when it lives in this process. Cleared on close.
    ///
    /// Held weakly, so two cached peers never keep each other alive.
    pub fn set_local_peer(&self, peer: Option<&Arc<Endpoint>>) {
        self.inner.lock().local_peer = peer.map(Arc::downgrade).unwrap_or_default();
    }

    fn on_slot_status_changed(&self) {
        let mut inner = self.inner.lock();

        // Events raised just before the endpoint closed or moved can still land here.
        if inner.state.is_closed() {
            return;
        }

        if enabled!(Level::DEBUG) {
            self.log_slot_activity(&inner);
        }

        let state = self.signals_state_locked(&mut inner);
        inner.watchers.notify_state(state);
    }

    fn log_slot_activity(&self, inner: &Inner) {
        let Some(status) = self.transport.status(inner.slot) else {
            return;
        };
        if status.has_messages {
            let mut peek = PeekSize::default();
            // A non-matching filter never dequeues, so the result is always empty.
            let _ = self.transport.receive(inner.slot, Some(&mut peek));
            trace!(pipe_id = self.pipe_id, side = self.side, slot = %inner.slot, size = peek.size, "new message detected");
        }
        if status.peer_closed {
            debug!(pipe_id = self.pipe_id, side = self.side, slot = %inner.slot, "peer closure detected");
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        // Nobody is left to complete a transit, so the slot is still ours.
        if matches!(inner.state, EndpointState::Open | EndpointState::InTransit) {
            debug!(pipe_id = self.pipe_id, side = self.side, state = ?inner.state, "releasing slot of dropped endpoint");
            inner.watchers.notify_closed();
            self.transport.close_port_slot(inner.slot);
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("pipe_id", &self.pipe_id)
            .field("side", &self.side)
            .field("state", &self.state())
            .finish()
    }
}

/// Create both endpoints of a new pipe on `node` from a fresh port pair.
pub fn create_local_pipe(
    node: &Arc<crate::transport::LocalNode>,
    pipe_id: u64,
    config: &EndpointConfig,
) -> (Arc<Endpoint>, Arc<Endpoint>) {
    let (slot0, slot1) = node.create_port_pair();
    let transport: Arc<dyn RoutingTransport> = node.clone();
    let end0 = Endpoint::with_config(transport.clone(), slot0, pipe_id, 0, config);
    let end1 = Endpoint::with_config(transport, slot1, pipe_id, 1, config);
    end0.set_local_peer(Some(&end1));
    end1.set_local_peer(Some(&end0));
    (end0, end1)
}
