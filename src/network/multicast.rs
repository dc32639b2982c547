//! Multicast heartbeat transport
//!
//! One UDP socket joined to the configured group. The receive path decodes
//! heartbeats and forwards them to the coordinator; the send path writes the
//! frames the coordinator queues. The two run as independent tasks.

use crate::common::{Error, Result};
use crate::network::interfaces::{HostInterfaces, LocalInterfaceSet};
use crate::wire::{decode, HeartbeatMessage, Message, MAX_DATAGRAM};
use bytes::Bytes;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct MulticastTransport {
    socket: Arc<UdpSocket>,
    group: SocketAddrV4,
    local: LocalInterfaceSet,
    listen_port: u16,
}

impl MulticastTransport {
    /// Enumerate interfaces and join `group:port`.
    ///
    /// `listen_port` is this peer's TCP port, used to tell our own heartbeats
    /// apart from those of other peers on the same host.
    pub fn join(group: Ipv4Addr, port: u16, listen_port: u16) -> Result<Self> {
        let host = HostInterfaces::discover()?;
        let iface = host.multicast_if.unwrap_or_else(|| {
            tracing::warn!("no non-loopback IPv4 interface, letting the kernel pick one");
            Ipv4Addr::UNSPECIFIED
        });
        tracing::info!(
            "joining multicast group {}:{} on {} ({} local addresses)",
            group,
            port,
            iface,
            host.local.len()
        );

        let socket = open_socket(group, port, iface).map_err(|e| Error::MulticastJoin {
            group: format!("{}:{}", group, port),
            reason: e.to_string(),
        })?;

        Ok(Self {
            socket: Arc::new(socket),
            group: SocketAddrV4::new(group, port),
            local: host.local,
            listen_port,
        })
    }

    pub fn group(&self) -> SocketAddrV4 {
        self.group
    }

    /// Run both paths until shutdown. The socket closes when this returns.
    pub async fn run(
        self,
        heartbeats: mpsc::Sender<HeartbeatMessage>,
        outbound: mpsc::Receiver<Bytes>,
        shutdown: watch::Receiver<bool>,
    ) {
        let sender = tokio::spawn(send_loop(
            self.socket.clone(),
            SocketAddr::V4(self.group),
            outbound,
            shutdown.clone(),
        ));

        self.receive_loop(heartbeats, shutdown).await;

        if let Err(e) = sender.await {
            tracing::error!("multicast sender task failed: {}", e);
        }
        tracing::info!("multicast transport on {} stopped", self.group);
    }

    async fn receive_loop(
        &self,
        heartbeats: mpsc::Sender<HeartbeatMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok((len, src)) => {
                        tracing::trace!("read {} bytes from {}", len, src);
                        match classify_datagram(&buf[..len], src, &self.local, self.listen_port) {
                            Ok(Some(msg)) => {
                                if heartbeats.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => tracing::warn!("dropping datagram from {}: {}", src, e),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("multicast receive failed: {}", e);
                        tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    }
}

async fn send_loop(
    socket: Arc<UdpSocket>,
    group: SocketAddr,
    mut outbound: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => match socket.send_to(&frame, group).await {
                    Ok(sent) => tracing::trace!("sent {} bytes to {}", sent, group),
                    Err(e) => tracing::warn!("multicast send to {} failed: {}", group, e),
                },
                None => break,
            },
        }
    }
}

/// Decide what to do with one received datagram.
///
/// Returns the heartbeat to forward, `None` for datagrams that are ours or
/// not heartbeats, and an error for anything that does not decode.
pub fn classify_datagram(
    datagram: &[u8],
    src: SocketAddr,
    local: &LocalInterfaceSet,
    listen_port: u16,
) -> Result<Option<HeartbeatMessage>> {
    match decode(datagram)? {
        Message::Heartbeat(mut msg) => {
            if local.contains(&src.ip()) && msg.listen_port == listen_port {
                return Ok(None);
            }
            msg.source = src.ip().to_string();
            Ok(Some(msg))
        }
        Message::Data(_) => {
            tracing::debug!("ignoring data message on multicast from {}", src);
            Ok(None)
        }
    }
}

fn open_socket(group: Ipv4Addr, port: u16, iface: Ipv4Addr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))?;
    socket.join_multicast_v4(&group, &iface)?;
    socket.set_multicast_if_v4(&iface)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}
