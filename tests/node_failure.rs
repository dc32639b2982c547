//! A peer whose announced source is unreachable must not stall the coordinator,
//! and must not pass off its empty value as the adopted one.

use nds::network::{fetch_value, Acceptor};
use nds::peer::{Coordinator, CoordinatorQueues, PeerState};
use nds::wire::{encode_body, DataMessage, HeartbeatMessage, Message};
use nds::PeerConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const T1: u64 = 1_700_000_000;

struct Harness {
    addr: SocketAddr,
    heartbeats: mpsc::Sender<HeartbeatMessage>,
    handle: JoinHandle<PeerState>,
    _exit: mpsc::Sender<()>,
    _shutdown: watch::Sender<bool>,
}

async fn start_coordinator() -> Harness {
    let acceptor = Acceptor::bind(Ipv4Addr::LOCALHOST, 0).await;
    let addr = acceptor.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::channel(16);
    let (hb_tx, hb_rx) = mpsc::channel(16);
    let (out_tx, mut out_rx) = mpsc::channel(16);
    let (exit_tx, exit_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(acceptor.run(conn_tx, shutdown_rx));
    tokio::spawn(async move { while out_rx.recv().await.is_some() {} });

    let config = PeerConfig {
        start_node: true,
        sync_window_ms: 60_000,
        tick_interval_ms: 60_000,
        fetch_timeout_ms: 200,
        ..Default::default()
    };
    let coordinator = Coordinator::new(
        &config,
        addr,
        CoordinatorQueues {
            connections: conn_rx,
            heartbeats: hb_rx,
            outbound: out_tx,
            exit: exit_rx,
        },
    );

    Harness {
        addr,
        heartbeats: hb_tx,
        handle: tokio::spawn(coordinator.run()),
        _exit: exit_tx,
        _shutdown: shutdown_tx,
    }
}

fn heartbeat(port: u16) -> HeartbeatMessage {
    HeartbeatMessage {
        listen_port: port,
        source: "127.0.0.1".into(),
        timestamp: T1,
    }
}

#[tokio::test]
async fn test_unreachable_source_keeps_timestamp_and_serves() {
    // grab a port nobody listens on
    let dead_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let peer = start_coordinator().await;
    peer.heartbeats.send(heartbeat(dead_port)).await.unwrap();

    // give the failed fetch time to come and go
    tokio::time::sleep(Duration::from_millis(400)).await;

    // the adopted timestamp has no value yet, so the old (empty) pair is served
    let data = fetch_value(peer.addr, Duration::from_secs(1)).await.unwrap();
    assert_eq!(data, DataMessage::default());
    assert!(!peer.handle.is_finished());

    peer.handle.abort();
}

#[tokio::test]
async fn test_failed_fetch_is_retried_on_next_heartbeat() {
    // bound but not accepting yet: the first fetch hangs until its timeout
    let source = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let source_port = source.local_addr().unwrap().port();

    let peer = start_coordinator().await;
    peer.heartbeats.send(heartbeat(source_port)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let data = fetch_value(peer.addr, Duration::from_secs(1)).await.unwrap();
    assert_ne!(data.timestamp, T1);

    // the source comes back
    let body = encode_body(&Message::Data(DataMessage {
        value: "hello".into(),
        timestamp: T1,
    }))
    .unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = source.accept().await {
            // the timed-out connection from the first fetch is still queued
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        }
    });

    // same timestamp again: the value is still missing, so it is asked for again
    peer.heartbeats.send(heartbeat(source_port)).await.unwrap();

    let mut synced = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let data = fetch_value(peer.addr, Duration::from_secs(1)).await.unwrap();
        if data.value == "hello" {
            synced = Some(data);
            break;
        }
    }
    let data = synced.expect("value was never fetched again");
    assert_eq!(data.timestamp, T1);

    peer.handle.abort();
}
