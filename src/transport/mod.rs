//! Routing transport contract consumed by message pipe endpoints.
//!
//! The transport owns the graph of addressable ports and their slots. It
//! performs the actual enqueue/dequeue, detects peer closure, and merges
//! local ports. Endpoints never touch queues directly.

mod local;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use local::LocalNode;

/// Globally unique name of a port in the routing graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortName(pub Uuid);

impl PortName {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identifier of a slot within a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SlotId(pub u64);

/// The primary slot every port is created with.
pub const DEFAULT_SLOT_ID: SlotId = SlotId(0);

impl SlotId {
    pub fn is_default(self) -> bool {
        self == DEFAULT_SLOT_ID
    }
}

/// Address of a slot: the port plus the slot within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub port: PortName,
    pub slot_id: SlotId,
}

impl SlotRef {
    pub fn new(port: PortName, slot_id: SlotId) -> Self {
        Self { port, slot_id }
    }

    /// The default slot of `port`.
    pub fn primary(port: PortName) -> Self {
        Self::new(port, DEFAULT_SLOT_ID)
    }

    pub fn is_default(&self) -> bool {
        self.slot_id.is_default()
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.slot_id.0)
    }
}

/// A user message carried by the transport.
///
/// Attached ports travel with the payload; the transport refuses to send a
/// port (or its peer) through itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    payload: Vec<u8>,
    ports: Vec<PortName>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ports: Vec::new(),
        }
    }

    pub fn with_ports(payload: impl Into<Vec<u8>>, ports: Vec<PortName>) -> Self {
        Self {
            payload: payload.into(),
            ports,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn ports(&self) -> &[PortName] {
        &self.ports
    }

    /// Size counted against the receive-bytes quota.
    pub fn num_bytes(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Decides whether `receive` may dequeue the next message.
///
/// A filter that returns `false` leaves the message queued; this doubles as
/// a way to peek at the head of the queue.
pub trait MessageFilter {
    fn matches(&mut self, message: &Message) -> bool;
}

/// Snapshot of a slot as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotStatus {
    pub has_messages: bool,
    /// More messages may still arrive (peer open, or data still queued).
    pub receiving_messages: bool,
    pub peer_closed: bool,
    pub peer_remote: bool,
    pub queued_message_count: u64,
    pub queued_num_bytes: u64,
}

/// Callback invoked by the transport on any status change of a slot.
///
/// May be invoked from any thread at any time.
pub type SlotObserver = Arc<dyn Fn() + Send + Sync>;

/// Transport-level failure codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("port or slot unknown")]
    PortUnknown,

    #[error("port is in an unexpected state")]
    PortStateUnexpected,

    #[error("cannot send a port or its peer through itself")]
    CannotSendToPeer,

    #[error("peer closed")]
    PeerClosed,

    #[error("internal transport error (code {0})")]
    Internal(i32),
}

/// The routing layer an endpoint delegates message delivery to.
pub trait RoutingTransport: Send + Sync {
    /// Enqueue `message` for the peer of `slot`.
    fn send(&self, slot: SlotRef, message: Message) -> Result<(), TransportError>;

    /// Dequeue the next message on `slot`.
    ///
    /// `Ok(None)` means nothing is available (or the filter declined it).
    /// `Err(PeerClosed)` is returned only once the queue is drained.
    fn receive(
        &self,
        slot: SlotRef,
        filter: Option<&mut dyn MessageFilter>,
    ) -> Result<Option<Message>, TransportError>;

    /// Current status of `slot`, or `None` if it cannot be reported.
    fn status(&self, slot: SlotRef) -> Option<SlotStatus>;

    /// Install or remove the status observer for `slot`.
    fn set_observer(&self, slot: SlotRef, observer: Option<SlotObserver>);

    /// Release `slot`. Closing the default slot closes the whole port.
    fn close_port_slot(&self, slot: SlotRef);

    /// Splice the peers of two local ports into a direct link.
    fn merge_local_ports(&self, a: PortName, b: PortName) -> Result<(), TransportError>;

    /// Resolve a port name to its default slot.
    fn get_port(&self, name: PortName) -> Result<SlotRef, TransportError>;
}
