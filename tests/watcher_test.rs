//! Tests for watcher registration and signal fan-out.

mod common;

use std::sync::Arc;

use common::{Event, Recorder};
use msgpipe_core::config::EndpointConfig;
use msgpipe_core::endpoint::{create_local_pipe, HandleSignals, PipeError, Watcher};
use msgpipe_core::transport::{LocalNode, Message};

fn watched() -> (
    Arc<LocalNode>,
    Arc<msgpipe_core::Endpoint>,
    Arc<msgpipe_core::Endpoint>,
    Arc<Recorder>,
) {
    let node = Arc::new(LocalNode::new());
    let (a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
    let recorder = Recorder::new();
    b.add_watcher(recorder.clone(), 5).unwrap();
    (node, a, b, recorder)
}

#[test]
fn test_add_reports_current_state() {
    let (_node, _a, b, recorder) = watched();
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], Event::Signals(5, b.signals_state()));
}

#[test]
fn test_incoming_message_notifies() {
    let (_node, a, _b, recorder) = watched();
    a.write(Message::new(vec![1])).unwrap();
    let state = recorder.last_state().unwrap();
    assert!(state.satisfies_any(HandleSignals::READABLE));
}

#[test]
fn test_read_that_drains_notifies() {
    let (_node, a, b, recorder) = watched();
    a.write(Message::new(vec![1])).unwrap();
    b.read().unwrap();
    let state = recorder.last_state().unwrap();
    assert!(!state.satisfies_any(HandleSignals::READABLE));
}

#[test]
fn test_unchanged_state_is_not_repeated() {
    let (_node, a, b, recorder) = watched();
    a.write(Message::new(vec![1])).unwrap();
    a.write(Message::new(vec![2])).unwrap();
    // Second message leaves the signals state as it was.
    let signals = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Signals(..)))
        .count();
    assert_eq!(signals, 2);
    drop(b);
}

#[test]
fn test_peer_close_notifies() {
    let (_node, a, _b, recorder) = watched();
    a.close().unwrap();
    let state = recorder.last_state().unwrap();
    assert!(state.satisfies_any(HandleSignals::PEER_CLOSED));
    assert!(!state.can_satisfy_any(HandleSignals::WRITABLE));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let (_node, _a, b, recorder) = watched();
    let watcher: Arc<dyn Watcher> = recorder.clone();
    assert_eq!(b.add_watcher(watcher.clone(), 5), Err(PipeError::AlreadyExists));
    // Same watcher under another context is a separate registration.
    b.add_watcher(watcher, 6).unwrap();
}

#[test]
fn test_remove_stops_notifications() {
    let (_node, a, b, recorder) = watched();
    let watcher: Arc<dyn Watcher> = recorder.clone();
    b.remove_watcher(&watcher, 5).unwrap();
    recorder.clear();

    a.write(Message::new(vec![1])).unwrap();
    b.close().unwrap();
    assert!(recorder.events().is_empty());
}

#[test]
fn test_remove_unknown_is_invalid() {
    let (_node, _a, b, recorder) = watched();
    let watcher: Arc<dyn Watcher> = recorder.clone();
    assert!(matches!(b.remove_watcher(&watcher, 99), Err(PipeError::InvalidArgument(_))));

    let stranger: Arc<dyn Watcher> = Recorder::new();
    assert!(matches!(b.remove_watcher(&stranger, 5), Err(PipeError::InvalidArgument(_))));
}

#[test]
fn test_remove_after_close_is_invalid() {
    let (_node, _a, b, recorder) = watched();
    b.close().unwrap();
    let watcher: Arc<dyn Watcher> = recorder.clone();
    assert!(matches!(b.remove_watcher(&watcher, 5), Err(PipeError::InvalidArgument(_))));
}

#[test]
fn test_add_during_transit_is_invalid() {
    let (_node, _a, b, _recorder) = watched();
    assert!(b.begin_transit());
    let late: Arc<dyn Watcher> = Recorder::new();
    assert!(matches!(b.add_watcher(late, 1), Err(PipeError::InvalidArgument(_))));
    b.cancel_transit().unwrap();
}

#[test]
fn test_late_watcher_after_change_refreshes_everyone() {
    let (_node, a, b, recorder) = watched();
    a.write(Message::new(vec![1])).unwrap();
    recorder.clear();

    let other = Recorder::new();
    b.add_watcher(other.clone(), 8).unwrap();
    // State matches the last fan-out, so only the newcomer hears about it.
    assert!(recorder.events().is_empty());
    assert_eq!(other.events().len(), 1);
}

#[test]
fn test_peer_remote_signal() {
    let (node, a, _b, recorder) = watched();
    node.set_peer_remote(a.slot().port, true).unwrap();
    assert!(a.signals_state().satisfies_any(HandleSignals::PEER_REMOTE));
    // Only the port whose peer moved changes.
    assert!(!recorder.last_state().unwrap().satisfies_any(HandleSignals::PEER_REMOTE));
}
