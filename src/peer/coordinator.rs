//! Coordinator event loop
//!
//! The only owner of `PeerState`. Waits on the tick timer, accepted
//! connections, received heartbeats, fetched values and exit requests, and
//! handles exactly one event at a time.

use crate::common::{timestamp_now, PeerConfig};
use crate::network::client::fetch_value;
use crate::peer::state::{HeartbeatVerdict, PeerPhase, PeerState, TickAction};
use crate::wire::{encode, encode_body, DataMessage, HeartbeatMessage, Message, Timestamp};
use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Capacity of the coordinator's internal fetch queue
const SYNC_QUEUE: usize = 16;

/// Queues injected into the coordinator at construction
pub struct CoordinatorQueues {
    /// Accepted client connections
    pub connections: mpsc::Receiver<TcpStream>,
    /// Heartbeats decoded by the transport
    pub heartbeats: mpsc::Receiver<HeartbeatMessage>,
    /// Raw frames for the transport to multicast
    pub outbound: mpsc::Sender<Bytes>,
    /// Exit requests
    pub exit: mpsc::Receiver<()>,
}

pub struct Coordinator {
    state: PeerState,
    long_lived: bool,
    publish: Option<String>,
    tick_interval: Duration,
    fetch_timeout: Duration,
    listen_port: u16,
    source: String,
    connections: mpsc::Receiver<TcpStream>,
    heartbeats: mpsc::Receiver<HeartbeatMessage>,
    outbound: mpsc::Sender<Bytes>,
    exit: mpsc::Receiver<()>,
    synced_tx: mpsc::Sender<DataMessage>,
    synced_rx: mpsc::Receiver<DataMessage>,
}

impl Coordinator {
    /// `listen_addr` is where the acceptor ended up listening.
    pub fn new(config: &PeerConfig, listen_addr: SocketAddr, queues: CoordinatorQueues) -> Self {
        let (synced_tx, synced_rx) = mpsc::channel(SYNC_QUEUE);
        Self {
            state: PeerState::new(Instant::now() + config.sync_window()),
            long_lived: config.start_node,
            publish: config.publish_value().map(str::to_string),
            tick_interval: config.tick_interval(),
            fetch_timeout: config.fetch_timeout(),
            listen_port: listen_addr.port(),
            source: listen_addr.to_string(),
            connections: queues.connections,
            heartbeats: queues.heartbeats,
            outbound: queues.outbound,
            exit: queues.exit,
            synced_tx,
            synced_rx,
        }
    }

    /// Process events until the peer terminates; returns the final state.
    pub async fn run(mut self) -> PeerState {
        self.bootstrap().await;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.on_tick().await == TickAction::Terminate {
                        break;
                    }
                }
                Some(stream) = self.connections.recv() => self.serve_connection(stream).await,
                Some(msg) = self.heartbeats.recv() => self.on_heartbeat(msg).await,
                Some(data) = self.synced_rx.recv() => self.on_synced(data),
                Some(()) = self.exit.recv() => {
                    tracing::info!("exit requested, stopping at next tick");
                    self.state.request_exit();
                }
            }
        }

        tracing::info!(
            "peer terminating (value: {:?}, timestamp: {})",
            self.state.value(),
            self.state.current_timestamp()
        );
        self.state
    }

    async fn bootstrap(&mut self) {
        match self.publish.take() {
            Some(value) => {
                let ts = timestamp_now();
                tracing::info!("publishing value {:?} with timestamp {}", value, ts);
                self.state.publish(value, ts);
                self.announce(ts).await;
            }
            None => {
                tracing::debug!("probing cluster");
                self.announce(0).await;
            }
        }
    }

    async fn on_tick(&mut self) -> TickAction {
        let action = self
            .state
            .on_tick(Instant::now(), self.long_lived, timestamp_now());
        match action {
            TickAction::SelfElected(ts) => {
                tracing::info!("no cluster answer, self-elected timestamp {}", ts);
                self.announce(ts).await;
            }
            TickAction::Announce(ts) => self.announce(ts).await,
            TickAction::Terminate | TickAction::Idle => {}
        }
        action
    }

    async fn on_heartbeat(&mut self, msg: HeartbeatMessage) {
        tracing::debug!(
            "heartbeat from {} (port {}): ts {}",
            msg.source,
            msg.listen_port,
            msg.timestamp
        );
        match self.state.on_heartbeat(msg.timestamp) {
            HeartbeatVerdict::Adopted(ts) => {
                tracing::info!("adopted timestamp {} from {}", ts, msg.source);
                self.request_value(&msg);
            }
            HeartbeatVerdict::Refetch(ts) => {
                tracing::debug!("value for timestamp {} still missing, asking {}", ts, msg.source);
                self.request_value(&msg);
            }
            HeartbeatVerdict::Outdated => self.announce(self.state.current_timestamp()).await,
            HeartbeatVerdict::Ignored => {}
        }
    }

    fn on_synced(&mut self, data: DataMessage) {
        let ts = data.timestamp;
        if self.state.apply_synced(data) {
            tracing::info!("synchronized value {:?} at timestamp {}", self.state.value(), ts);
        } else {
            tracing::debug!("dropping stale value at timestamp {}", ts);
        }
    }

    /// Fetch the announcing peer's value in the background
    fn request_value(&self, msg: &HeartbeatMessage) {
        let Some(addr) = value_endpoint(msg) else {
            tracing::warn!(
                "cannot fetch value: bad source {:?} port {}",
                msg.source,
                msg.listen_port
            );
            return;
        };

        let synced = self.synced_tx.clone();
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            match fetch_value(addr, timeout).await {
                Ok(data) => {
                    let _ = synced.send(data).await;
                }
                Err(e) => tracing::warn!("value fetch from {} failed: {}", addr, e),
            }
        });
    }

    async fn announce(&self, timestamp: Timestamp) {
        if self.state.phase() == PeerPhase::Terminating {
            return;
        }

        let msg = Message::Heartbeat(HeartbeatMessage {
            listen_port: self.listen_port,
            source: self.source.clone(),
            timestamp,
        });
        let frame = match encode(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("building heartbeat: {}", e);
                return;
            }
        };
        if self.outbound.send(frame).await.is_err() {
            tracing::warn!("multicast sender gone, heartbeat dropped");
        }
    }

    async fn serve_connection(&self, mut stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());

        let body = match encode_body(&Message::Data(self.state.data_message())) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("building data message: {}", e);
                return;
            }
        };

        let write = async {
            stream.write_all(&body).await?;
            stream.shutdown().await
        };
        match tokio::time::timeout(self.fetch_timeout, write).await {
            Ok(Ok(())) => tracing::debug!("sent {} bytes to {}", body.len(), peer),
            Ok(Err(e)) => tracing::warn!("sending data to {}: {}", peer, e),
            Err(_) => tracing::warn!("sending data to {} timed out", peer),
        }
    }
}

/// TCP endpoint serving the value announced by `msg`
fn value_endpoint(msg: &HeartbeatMessage) -> Option<SocketAddr> {
    if msg.listen_port == 0 {
        return None;
    }
    let ip = msg
        .source
        .parse::<IpAddr>()
        .ok()
        .or_else(|| msg.source.parse::<SocketAddr>().ok().map(|a| a.ip()))?;
    Some(SocketAddr::new(ip, msg.listen_port))
}
