//! TCP connection acceptor

use crate::common::Result;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct Acceptor {
    listener: TcpListener,
    port: u16,
}

impl Acceptor {
    /// Bind `ip:port`, moving to the next port on every failure until one sticks.
    ///
    /// Port 0 asks the OS for an ephemeral port.
    pub async fn bind(ip: Ipv4Addr, port: u16) -> Self {
        let mut port = port;
        loop {
            match TcpListener::bind(SocketAddrV4::new(ip, port)).await {
                Ok(listener) => {
                    let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                    tracing::info!("listening on {}:{}", ip, port);
                    return Self { listener, port };
                }
                Err(e) => {
                    let next = next_port(port);
                    tracing::debug!("bind {}:{} failed ({}), trying port {}", ip, port, e, next);
                    port = next;
                    // an address that is not ours fails on every port
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Hand accepted connections to the coordinator until shutdown.
    ///
    /// The listening socket closes when this returns.
    pub async fn run(self, connections: mpsc::Sender<TcpStream>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => {
                        tracing::debug!("connection accepted from {}", peer);
                        if connections.send(stream).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
        tracing::info!("acceptor on port {} stopped", self.port);
    }
}

fn next_port(port: u16) -> u16 {
    port.checked_add(1).unwrap_or(1)
}
