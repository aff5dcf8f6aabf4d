//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use msgpipe_core::endpoint::{SignalsState, Watcher};
use msgpipe_core::transport::{
    Message, MessageFilter, PortName, RoutingTransport, SlotObserver, SlotRef, SlotStatus,
    TransportError,
};
use parking_lot::Mutex;

/// One notification seen by a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Signals(u64, SignalsState),
    Closed(u64),
}

/// Watcher that appends every notification to a list.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn last_state(&self) -> Option<SignalsState> {
        self.events.lock().iter().rev().find_map(|e| match e {
            Event::Signals(_, state) => Some(*state),
            Event::Closed(_) => None,
        })
    }

    pub fn closed_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Watcher for Recorder {
    fn on_signals_changed(&self, context: u64, state: SignalsState) {
        self.events.lock().push(Event::Signals(context, state));
    }

    fn on_closed(&self, context: u64) {
        self.events.lock().push(Event::Closed(context));
    }
}

/// Transport that answers every call from a script.
///
/// Status is always an idle open slot; `send`, `receive` and
/// `merge_local_ports` return whatever was scripted.
pub struct ScriptedTransport {
    pub send_result: Mutex<Result<(), TransportError>>,
    pub receive_result: Mutex<Result<Option<Message>, TransportError>>,
    pub merge_result: Mutex<Result<(), TransportError>>,
    pub closed: Mutex<Vec<SlotRef>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            send_result: Mutex::new(Ok(())),
            receive_result: Mutex::new(Ok(None)),
            merge_result: Mutex::new(Ok(())),
            closed: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl RoutingTransport for ScriptedTransport {
    fn send(&self, _slot: SlotRef, _message: Message) -> Result<(), TransportError> {
        self.send_result.lock().clone()
    }

    fn receive(
        &self,
        _slot: SlotRef,
        _filter: Option<&mut dyn MessageFilter>,
    ) -> Result<Option<Message>, TransportError> {
        self.receive_result.lock().clone()
    }

    fn status(&self, _slot: SlotRef) -> Option<SlotStatus> {
        Some(SlotStatus {
            receiving_messages: true,
            ..SlotStatus::default()
        })
    }

    fn set_observer(&self, _slot: SlotRef, _observer: Option<SlotObserver>) {}

    fn close_port_slot(&self, slot: SlotRef) {
        self.closed.lock().push(slot);
    }

    fn merge_local_ports(&self, _a: PortName, _b: PortName) -> Result<(), TransportError> {
        self.merge_result.lock().clone()
    }

    fn get_port(&self, name: PortName) -> Result<SlotRef, TransportError> {
        Ok(SlotRef::primary(name))
    }
}
