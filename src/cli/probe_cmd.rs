// Copyright 2024-2026 msgpipe-core Contributors
// SPDX-License-Identifier: Apache-2.0

//! `probe` subcommand: drive a pipe on an in-process transport through
//! write/read, transfer, quota, fuse and async waiting.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::EndpointConfig;
use crate::endpoint::{
    create_local_pipe, Endpoint, HandleSignals, PipeError, QuotaKind, QuotaRequest, SignalWaiter,
    Watcher,
};
use crate::transport::{LocalNode, Message, RoutingTransport};

/// Outcome of one probe check.
#[derive(Debug, Clone)]
pub struct ProbeCheck {
    pub name: &'static str,
    pub result: Result<(), String>,
}

fn expect_payload(endpoint: &Endpoint, expected: &[u8]) -> Result<(), String> {
    let message = endpoint.read().map_err(|e| e.to_string())?;
    if message.payload() == expected {
        Ok(())
    } else {
        Err(format!("read {:?}, expected {:?}", message.payload(), expected))
    }
}

fn check_write_read(node: &Arc<LocalNode>, config: &EndpointConfig) -> Result<(), String> {
    let (a, b) = create_local_pipe(node, rand::random(), config);
    a.write(Message::new(b"ping".to_vec())).map_err(|e| e.to_string())?;
    expect_payload(&b, b"ping")?;
    match b.read() {
        Err(PipeError::ShouldWait) => {}
        other => return Err(format!("drained pipe returned {:?}", other)),
    }
    a.close().map_err(|e| e.to_string())?;
    b.close().map_err(|e| e.to_string())
}

fn check_transfer(node: &Arc<LocalNode>, config: &EndpointConfig) -> Result<(), String> {
    let (a, b) = create_local_pipe(node, rand::random(), config);
    if !b.begin_transit() {
        return Err("begin_transit refused an open endpoint".into());
    }
    let record = b.end_serialize().map_err(|e| e.to_string())?;
    b.complete_transit_and_close().map_err(|e| e.to_string())?;
    let transport: Arc<dyn RoutingTransport> = node.clone();
    let moved = Endpoint::deserialize(transport, &record).map_err(|e| e.to_string())?;

    if moved.pipe_id() != a.pipe_id() || moved.side() != 1 {
        return Err("transferred endpoint lost its identity".into());
    }
    a.write(Message::new(b"after-transfer".to_vec())).map_err(|e| e.to_string())?;
    expect_payload(&moved, b"after-transfer")?;
    a.close().map_err(|e| e.to_string())?;
    moved.close().map_err(|e| e.to_string())
}

fn check_quota(node: &Arc<LocalNode>, config: &EndpointConfig) -> Result<(), String> {
    let (a, b) = create_local_pipe(node, rand::random(), config);
    b.set_quota(QuotaRequest {
        kind: QuotaKind::ReceiveQueueLength,
        limit: 1,
    });
    for _ in 0..2 {
        a.write(Message::new(vec![0u8; 8])).map_err(|e| e.to_string())?;
    }
    let state = b.signals_state();
    let tripped = state.satisfies_any(HandleSignals::QUOTA_EXCEEDED);
    a.close().map_err(|e| e.to_string())?;
    b.close().map_err(|e| e.to_string())?;
    if tripped {
        Ok(())
    } else {
        Err("two queued messages did not exceed a limit of one".into())
    }
}

fn check_fuse(node: &Arc<LocalNode>, config: &EndpointConfig) -> Result<(), String> {
    let (x, a) = create_local_pipe(node, rand::random(), config);
    let (b, y) = create_local_pipe(node, rand::random(), config);
    a.fuse(&b).map_err(|e| e.to_string())?;
    x.write(Message::new(b"across".to_vec())).map_err(|e| e.to_string())?;
    expect_payload(&y, b"across")?;
    x.close().map_err(|e| e.to_string())?;
    y.close().map_err(|e| e.to_string())
}

async fn check_wait(node: &Arc<LocalNode>, config: &EndpointConfig) -> Result<(), String> {
    let (a, b) = create_local_pipe(node, rand::random(), config);
    let waiter = Arc::new(SignalWaiter::new());
    let watcher: Arc<dyn Watcher> = waiter.clone();
    b.add_watcher(watcher, 0).map_err(|e| e.to_string())?;

    let writer = a.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        writer.write(Message::new(b"wake".to_vec()))
    });
    waiter
        .wait_for(HandleSignals::READABLE, Duration::from_secs(2))
        .await
        .map_err(|e| e.to_string())?;
    task.await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    expect_payload(&b, b"wake")?;
    a.close().map_err(|e| e.to_string())?;
    b.close().map_err(|e| e.to_string())
}

/// Run all probe checks against a fresh in-process node.
pub async fn collect_checks(config: &EndpointConfig) -> Vec<ProbeCheck> {
    let node = Arc::new(LocalNode::new());
    let mut checks = vec![
        ProbeCheck {
            name: "write_read",
            result: check_write_read(&node, config),
        },
        ProbeCheck {
            name: "transfer",
            result: check_transfer(&node, config),
        },
        ProbeCheck {
            name: "quota",
            result: check_quota(&node, config),
        },
        ProbeCheck {
            name: "fuse",
            result: check_fuse(&node, config),
        },
    ];
    checks.push(ProbeCheck {
        name: "wait",
        result: check_wait(&node, config).await,
    });
    if node.port_count() != 0 {
        checks.push(ProbeCheck {
            name: "no_leaked_ports",
            result: Err(format!("{} ports left open", node.port_count())),
        });
    }
    checks
}

/// Print one line per check. Returns 0 if every check passed.
pub async fn run_probe(config: &EndpointConfig) -> i32 {
    let checks = collect_checks(config).await;
    let mut failed = 0;
    for check in &checks {
        match &check.result {
            Ok(()) => println!("ok    {}", check.name),
            Err(e) => {
                println!("FAIL  {}: {}", check.name, e);
                failed += 1;
            }
        }
    }
    info!(checks = checks.len(), failed, "probe finished");
    if failed == 0 {
        0
    } else {
        1
    }
}
