//! Message pipe throughput benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use msgpipe_core::config::EndpointConfig;
use msgpipe_core::endpoint::wire::{decode_record, encode_record};
use msgpipe_core::endpoint::{create_local_pipe, Endpoint};
use msgpipe_core::transport::{LocalNode, Message, RoutingTransport};

fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_read");

    for (name, size) in [("small", 64usize), ("medium", 4096), ("large", 65536)] {
        let node = Arc::new(LocalNode::new());
        let (a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
        let payload = vec![0xa5u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), &payload, |bench, payload| {
            bench.iter(|| {
                a.write(Message::new(payload.clone())).unwrap();
                black_box(b.read().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_record_codec(c: &mut Criterion) {
    c.bench_function("record_encode_decode", |b| {
        b.iter(|| {
            let bytes = encode_record(black_box(0xdead_beef), black_box(1));
            decode_record(black_box(&bytes)).unwrap()
        })
    });
}

fn bench_transfer(c: &mut Criterion) {
    let node = Arc::new(LocalNode::new());
    let transport: Arc<dyn RoutingTransport> = node.clone();
    let (_a, b) = create_local_pipe(&node, 1, &EndpointConfig::default());
    let mut current = b;

    c.bench_function("transfer_round_trip", |bench| {
        bench.iter(|| {
            assert!(current.begin_transit());
            let record = current.end_serialize().unwrap();
            current.complete_transit_and_close().unwrap();
            current = Endpoint::deserialize(transport.clone(), &record).unwrap();
        })
    });
}

criterion_group!(benches, bench_write_read, bench_record_codec, bench_transfer);
criterion_main!(benches);
