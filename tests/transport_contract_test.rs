//! Tests for how endpoints map transport responses onto caller results.

mod common;

use std::sync::Arc;

use common::ScriptedTransport;
use msgpipe_core::endpoint::{Endpoint, EndpointState, PipeError};
use msgpipe_core::transport::{Message, PortName, RoutingTransport, SlotRef, TransportError};

fn endpoint_on(transport: &Arc<ScriptedTransport>) -> Arc<Endpoint> {
    let shared: Arc<dyn RoutingTransport> = transport.clone();
    Endpoint::new(shared, SlotRef::primary(PortName::random()), 1, 0)
}

#[test]
fn test_send_errors_map_to_caller_errors() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);

    for code in [
        TransportError::PortUnknown,
        TransportError::PortStateUnexpected,
        TransportError::CannotSendToPeer,
    ] {
        *transport.send_result.lock() = Err(code);
        assert!(matches!(
            endpoint.write(Message::new(vec![0])),
            Err(PipeError::InvalidArgument(_))
        ));
    }

    *transport.send_result.lock() = Err(TransportError::PeerClosed);
    assert!(matches!(
        endpoint.write(Message::new(vec![0])),
        Err(PipeError::FailedPrecondition(_))
    ));
}

#[test]
fn test_receive_errors_map_to_caller_errors() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);

    assert_eq!(endpoint.read(), Err(PipeError::ShouldWait));

    *transport.receive_result.lock() = Err(TransportError::PeerClosed);
    assert!(matches!(endpoint.read(), Err(PipeError::FailedPrecondition(_))));

    *transport.receive_result.lock() = Err(TransportError::PortUnknown);
    assert!(matches!(endpoint.read(), Err(PipeError::InvalidArgument(_))));

    *transport.receive_result.lock() = Ok(Some(Message::new(b"x".to_vec())));
    assert_eq!(endpoint.read().unwrap().payload(), b"x");
}

#[test]
#[should_panic(expected = "transport send returned")]
fn test_unexpected_send_response_panics() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);
    *transport.send_result.lock() = Err(TransportError::Internal(3));
    let _ = endpoint.write(Message::new(vec![0]));
}

#[test]
#[should_panic(expected = "transport receive returned")]
fn test_unexpected_receive_response_panics() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);
    *transport.receive_result.lock() = Err(TransportError::Internal(-1));
    let _ = endpoint.read();
}

#[test]
fn test_merge_failure_is_precondition_and_closes_both() {
    let transport = ScriptedTransport::new();
    let a = endpoint_on(&transport);
    let b = endpoint_on(&transport);
    *transport.merge_result.lock() = Err(TransportError::PortUnknown);

    assert!(matches!(a.fuse(&b), Err(PipeError::FailedPrecondition(_))));
    assert_eq!(a.state(), EndpointState::ClosedLocal);
    assert_eq!(b.state(), EndpointState::ClosedLocal);
    // Fused endpoints never release their slots themselves.
    assert!(transport.closed.lock().is_empty());
}

#[test]
fn test_close_releases_slot_once() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);
    let slot = endpoint.slot();
    endpoint.close().unwrap();
    drop(endpoint);
    assert_eq!(*transport.closed.lock(), vec![slot]);
}

#[test]
fn test_transfer_never_releases_slot() {
    let transport = ScriptedTransport::new();
    let endpoint = endpoint_on(&transport);
    assert!(endpoint.begin_transit());
    endpoint.complete_transit_and_close().unwrap();
    drop(endpoint);
    assert!(transport.closed.lock().is_empty());
}
