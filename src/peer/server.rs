//! Peer server

use crate::common::{PeerConfig, Result};
use crate::network::{Acceptor, MulticastTransport};
use crate::peer::coordinator::{Coordinator, CoordinatorQueues};
use crate::peer::state::PeerState;
use std::future::Future;
use tokio::sync::{mpsc, watch};

/// Depth of each queue feeding the coordinator
const QUEUE_DEPTH: usize = 64;

pub struct Peer {
    config: PeerConfig,
}

impl Peer {
    pub fn new(config: PeerConfig) -> Self {
        Self { config }
    }

    /// Run until the peer terminates or Ctrl-C is pressed
    pub async fn run(self) -> Result<PeerState> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the peer terminates; `exit` resolving requests termination
    /// at the next tick.
    pub async fn run_until<F>(self, exit: F) -> Result<PeerState>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;

        tracing::info!("Starting peer");
        tracing::info!(
            "  Mode: {}",
            if self.config.start_node { "node" } else { "one-shot" }
        );
        tracing::info!(
            "  Multicast: {}:{}",
            self.config.multicast_addr,
            self.config.multicast_port
        );
        tracing::info!("  TCP port: {}", self.config.listen_port);

        let acceptor = Acceptor::bind(self.config.bind_ip, self.config.listen_port).await;
        let listen_addr = acceptor.local_addr()?;

        let transport = MulticastTransport::join(
            self.config.multicast_addr,
            self.config.multicast_port,
            listen_addr.port(),
        )?;
        tracing::info!("  Joined: {}", transport.group());

        let (conn_tx, conn_rx) = mpsc::channel(QUEUE_DEPTH);
        let (hb_tx, hb_rx) = mpsc::channel(QUEUE_DEPTH);
        let (out_tx, out_rx) = mpsc::channel(QUEUE_DEPTH);
        let (exit_tx, exit_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let acceptor_handle = tokio::spawn(acceptor.run(conn_tx, shutdown_rx.clone()));
        let transport_handle = tokio::spawn(transport.run(hb_tx, out_rx, shutdown_rx));
        let exit_handle = tokio::spawn(async move {
            exit.await;
            let _ = exit_tx.send(()).await;
        });

        let coordinator = Coordinator::new(
            &self.config,
            listen_addr,
            CoordinatorQueues {
                connections: conn_rx,
                heartbeats: hb_rx,
                outbound: out_tx,
                exit: exit_rx,
            },
        );

        tracing::info!("✓ Peer ready");
        let state = coordinator.run().await;

        exit_handle.abort();
        let _ = shutdown_tx.send(true);
        for (name, handle) in [("acceptor", acceptor_handle), ("transport", transport_handle)] {
            if let Err(e) = handle.await {
                tracing::error!("{} task failed: {}", name, e);
            }
        }

        Ok(state)
    }
}
