//! In-process routing transport.
//!
//! All ports live in one table behind a single `parking_lot::Mutex`.
//! Observers are collected while the lock is held and invoked after it is
//! released, so an observer may call straight back into the node.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    Message, MessageFilter, PortName, RoutingTransport, SlotId, SlotObserver, SlotRef,
    SlotStatus, TransportError, DEFAULT_SLOT_ID,
};

#[derive(Default)]
struct Slot {
    queue: VecDeque<Message>,
    queued_bytes: u64,
    observer: Option<SlotObserver>,
}

impl Slot {
    fn push(&mut self, message: Message) {
        self.queued_bytes += message.num_bytes();
        self.queue.push_back(message);
    }

    fn pop(&mut self) -> Option<Message> {
        let message = self.queue.pop_front()?;
        self.queued_bytes -= message.num_bytes();
        Some(message)
    }

    fn drain(&mut self) -> Vec<Message> {
        self.queued_bytes = 0;
        self.queue.drain(..).collect()
    }
}

struct Port {
    peer: Option<PortName>,
    peer_closed: bool,
    peer_remote: bool,
    slots: HashMap<SlotId, Slot>,
}

impl Port {
    fn new(peer: PortName) -> Self {
        let mut slots = HashMap::new();
        slots.insert(DEFAULT_SLOT_ID, Slot::default());
        Self {
            peer: Some(peer),
            peer_closed: false,
            peer_remote: false,
            slots,
        }
    }

    fn observers(&self) -> Vec<SlotObserver> {
        self.slots.values().filter_map(|s| s.observer.clone()).collect()
    }
}

#[derive(Default)]
struct NodeState {
    ports: HashMap<PortName, Port>,
    next_slot_id: u64,
}

/// A routing transport whose whole port graph lives in this process.
#[derive(Default)]
pub struct LocalNode {
    state: Mutex<NodeState>,
}

fn notify(observers: Vec<SlotObserver>) {
    for observer in observers {
        observer();
    }
}

impl LocalNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create two entangled ports and return their default slots.
    pub fn create_port_pair(&self) -> (SlotRef, SlotRef) {
        let a = PortName::random();
        let b = PortName::random();
        let mut state = self.state.lock();
        state.ports.insert(a, Port::new(b));
        state.ports.insert(b, Port::new(a));
        trace!(port_a = %a, port_b = %b, "created port pair");
        (SlotRef::primary(a), SlotRef::primary(b))
    }

    /// Allocate a secondary slot on `port`, mirrored on its peer.
    pub fn allocate_slot(&self, port: PortName) -> Result<SlotRef, TransportError> {
        let mut state = self.state.lock();
        state.next_slot_id += 1;
        let id = SlotId(state.next_slot_id);

        let peer = {
            let local = state.ports.get_mut(&port).ok_or(TransportError::PortUnknown)?;
            local.slots.insert(id, Slot::default());
            local.peer
        };
        if let Some(remote) = peer.and_then(|p| state.ports.get_mut(&p)) {
            remote.slots.insert(id, Slot::default());
        }
        Ok(SlotRef::new(port, id))
    }

    /// Flag whether the peer of `port` lives in another process.
    pub fn set_peer_remote(&self, port: PortName, remote: bool) -> Result<(), TransportError> {
        let observers = {
            let mut state = self.state.lock();
            let local = state.ports.get_mut(&port).ok_or(TransportError::PortUnknown)?;
            if local.peer_remote == remote {
                return Ok(());
            }
            local.peer_remote = remote;
            local.observers()
        };
        notify(observers);
        Ok(())
    }

    pub fn has_port(&self, port: PortName) -> bool {
        self.state.lock().ports.contains_key(&port)
    }

    pub fn port_count(&self) -> usize {
        self.state.lock().ports.len()
    }
}

impl RoutingTransport for LocalNode {
    fn send(&self, slot: SlotRef, message: Message) -> Result<(), TransportError> {
        let observer = {
            let mut state = self.state.lock();
            let port = state.ports.get(&slot.port).ok_or(TransportError::PortUnknown)?;
            if !port.slots.contains_key(&slot.slot_id) {
                return Err(TransportError::PortUnknown);
            }
            if message
                .ports()
                .iter()
                .any(|p| *p == slot.port || Some(*p) == port.peer)
            {
                return Err(TransportError::CannotSendToPeer);
            }
            if port.peer_closed {
                return Err(TransportError::PeerClosed);
            }
            let peer_name = port.peer.ok_or(TransportError::PortStateUnexpected)?;
            let Some(peer) = state.ports.get_mut(&peer_name) else {
                return Err(TransportError::PeerClosed);
            };
            let target = peer
                .slots
                .get_mut(&slot.slot_id)
                .ok_or(TransportError::PortStateUnexpected)?;
            trace!(slot = %slot, bytes = message.num_bytes(), "enqueued message");
            target.push(message);
            target.observer.clone()
        };
        if let Some(observer) = observer {
            observer();
        }
        Ok(())
    }

    fn receive(
        &self,
        slot: SlotRef,
        filter: Option<&mut dyn MessageFilter>,
    ) -> Result<Option<Message>, TransportError> {
        let mut state = self.state.lock();
        let port = state.ports.get_mut(&slot.port).ok_or(TransportError::PortUnknown)?;
        let peer_closed = port.peer_closed;
        let target = port
            .slots
            .get_mut(&slot.slot_id)
            .ok_or(TransportError::PortUnknown)?;

        match target.queue.front() {
            Some(head) => {
                if let Some(filter) = filter {
                    if !filter.matches(head) {
                        return Ok(None);
                    }
                }
                Ok(target.pop())
            }
            None if peer_closed => Err(TransportError::PeerClosed),
            None => Ok(None),
        }
    }

    fn status(&self, slot: SlotRef) -> Option<SlotStatus> {
        let state = self.state.lock();
        let port = state.ports.get(&slot.port)?;
        let target = port.slots.get(&slot.slot_id)?;
        let has_messages = !target.queue.is_empty();
        Some(SlotStatus {
            has_messages,
            receiving_messages: has_messages || !port.peer_closed,
            peer_closed: port.peer_closed,
            peer_remote: port.peer_remote,
            queued_message_count: target.queue.len() as u64,
            queued_num_bytes: target.queued_bytes,
        })
    }

    fn set_observer(&self, slot: SlotRef, observer: Option<SlotObserver>) {
        let mut state = self.state.lock();
        if let Some(target) = state
            .ports
            .get_mut(&slot.port)
            .and_then(|p| p.slots.get_mut(&slot.slot_id))
        {
            target.observer = observer;
        }
    }

    fn close_port_slot(&self, slot: SlotRef) {
        let observers = {
            let mut state = self.state.lock();
            if slot.is_default() {
                let Some(port) = state.ports.remove(&slot.port) else {
                    return;
                };
                debug!(port = %slot.port, "closed port");
                match port.peer.and_then(|p| state.ports.get_mut(&p)) {
                    Some(peer) => {
                        peer.peer_closed = true;
                        peer.observers()
                    }
                    None => Vec::new(),
                }
            } else {
                if let Some(port) = state.ports.get_mut(&slot.port) {
                    port.slots.remove(&slot.slot_id);
                }
                Vec::new()
            }
        };
        notify(observers);
    }

    fn merge_local_ports(&self, a: PortName, b: PortName) -> Result<(), TransportError> {
        if a == b {
            return Err(TransportError::PortStateUnexpected);
        }

        let observers = {
            let mut state = self.state.lock();
            let (a_peer, b_peer) = match (state.ports.get(&a), state.ports.get(&b)) {
                (Some(pa), Some(pb)) => (pa.peer, pb.peer),
                _ => return Err(TransportError::PortUnknown),
            };
            if a_peer == Some(b) || b_peer == Some(a) {
                return Err(TransportError::PortStateUnexpected);
            }

            let mut port_a = state.ports.remove(&a).ok_or(TransportError::PortUnknown)?;
            let mut port_b = state.ports.remove(&b).ok_or(TransportError::PortUnknown)?;
            let from_a = port_a
                .slots
                .get_mut(&DEFAULT_SLOT_ID)
                .map(Slot::drain)
                .unwrap_or_default();
            let from_b = port_b
                .slots
                .get_mut(&DEFAULT_SLOT_ID)
                .map(Slot::drain)
                .unwrap_or_default();

            let a_peer = a_peer.filter(|p| !port_a.peer_closed && state.ports.contains_key(p));
            let b_peer = b_peer.filter(|p| !port_b.peer_closed && state.ports.contains_key(p));

            let mut observers = Vec::new();
            // Messages queued on one side were headed for the other side's peer.
            for (end, other_end, forwarded) in [(a_peer, b_peer, from_b), (b_peer, a_peer, from_a)] {
                let Some(port) = end.and_then(|p| state.ports.get_mut(&p)) else {
                    continue;
                };
                port.peer = other_end;
                port.peer_closed = other_end.is_none();
                if let Some(slot) = port.slots.get_mut(&DEFAULT_SLOT_ID) {
                    for message in forwarded {
                        slot.push(message);
                    }
                }
                observers.extend(port.observers());
            }
            debug!(port_a = %a, port_b = %b, "merged local ports");
            observers
        };
        notify(observers);
        Ok(())
    }

    fn get_port(&self, name: PortName) -> Result<SlotRef, TransportError> {
        if self.state.lock().ports.contains_key(&name) {
            Ok(SlotRef::primary(name))
        } else {
            Err(TransportError::PortUnknown)
        }
    }
}
