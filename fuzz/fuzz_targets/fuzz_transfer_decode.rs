//! Fuzz target for endpoint transfer record decoding.
//!
//! Arbitrary payloads and attachment shapes must be rejected with an error,
//! never a panic, and an accepted record must yield an open endpoint.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use msgpipe_core::endpoint::wire::{decode_record, PortAttachment, RawHandle, TransferRecord};
use msgpipe_core::endpoint::{Endpoint, EndpointState};
use msgpipe_core::transport::{LocalNode, RoutingTransport, SlotId};

#[derive(Debug, Arbitrary)]
struct Input {
    payload: Vec<u8>,
    attach_known_port: bool,
    extra_ports: u8,
    slot_id: Option<u64>,
    handles: Vec<i64>,
}

fuzz_target!(|input: Input| {
    let _ = decode_record(&input.payload);

    let node = Arc::new(LocalNode::new());
    let (_kept, moving) = node.create_port_pair();
    let name = if input.attach_known_port {
        moving.port
    } else {
        msgpipe_core::transport::PortName::random()
    };
    let attachment = PortAttachment {
        name,
        slot_id: input.slot_id.map(SlotId),
    };
    let record = TransferRecord {
        payload: input.payload,
        ports: vec![attachment; 1 + (input.extra_ports % 3) as usize],
        handles: input.handles.into_iter().map(RawHandle).collect(),
    };

    let transport: Arc<dyn RoutingTransport> = node.clone();
    if let Ok(endpoint) = Endpoint::deserialize(transport, &record) {
        assert_eq!(endpoint.state(), EndpointState::Open);
    }
});
