//! Tests for endpoints shared across threads.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{Event, Recorder};
use msgpipe_core::config::EndpointConfig;
use msgpipe_core::endpoint::{create_local_pipe, EndpointState, PipeError};
use msgpipe_core::transport::{LocalNode, Message};

#[test]
fn test_begin_transit_and_close_race_has_one_winner() {
    for _ in 0..200 {
        let node = Arc::new(LocalNode::new());
        let (_a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
        let barrier = Arc::new(Barrier::new(2));

        let closer = {
            let b = b.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                b.close().is_ok()
            })
        };
        barrier.wait();
        let transit = b.begin_transit();
        let closed = closer.join().unwrap();

        assert!(transit ^ closed, "transit={} closed={}", transit, closed);
        let expected = if transit {
            EndpointState::InTransit
        } else {
            EndpointState::ClosedLocal
        };
        assert_eq!(b.state(), expected);
        if transit {
            b.cancel_transit().unwrap();
        }
    }
}

#[test]
fn test_concurrent_writers_keep_per_writer_order() {
    const WRITERS: u8 = 4;
    const PER_WRITER: u32 = 250;

    let node = Arc::new(LocalNode::new());
    let (a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let a = a.clone();
            thread::spawn(move || {
                for seq in 0..PER_WRITER {
                    let mut payload = vec![w];
                    payload.extend_from_slice(&seq.to_le_bytes());
                    a.write(Message::new(payload)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut next = [0u32; WRITERS as usize];
    let mut total = 0;
    loop {
        match b.read() {
            Ok(message) => {
                let payload = message.payload();
                let writer = payload[0] as usize;
                let seq = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
                assert_eq!(seq, next[writer], "writer {} out of order", writer);
                next[writer] += 1;
                total += 1;
            }
            Err(PipeError::ShouldWait) => break,
            Err(e) => panic!("unexpected read error: {}", e),
        }
    }
    assert_eq!(total, WRITERS as u32 * PER_WRITER);
}

#[test]
fn test_notifications_racing_a_transfer_stop_at_close() {
    for _ in 0..50 {
        let node = Arc::new(LocalNode::new());
        let (a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
        let recorder = Recorder::new();
        b.add_watcher(recorder.clone(), 1).unwrap();

        let writer = {
            let a = a.clone();
            thread::spawn(move || {
                for i in 0..100u32 {
                    if a.write(Message::new(i.to_le_bytes().to_vec())).is_err() {
                        break;
                    }
                }
            })
        };

        assert!(b.begin_transit());
        b.end_serialize().unwrap();
        b.complete_transit_and_close().unwrap();
        writer.join().unwrap();

        let events = recorder.events();
        assert_eq!(recorder.closed_count(), 1);
        assert_eq!(events.last(), Some(&Event::Closed(1)));
    }
}

#[test]
fn test_close_from_both_sides_concurrently() {
    for _ in 0..100 {
        let node = Arc::new(LocalNode::new());
        let (a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
        let barrier = Arc::new(Barrier::new(2));

        let other = {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                a.close().unwrap();
            })
        };
        barrier.wait();
        b.close().unwrap();
        other.join().unwrap();
        assert_eq!(node.port_count(), 0);
    }
}
