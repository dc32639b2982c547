//! # nds
//!
//! A minimal cluster-membership and single-value synchronization daemon:
//! - Peers discover each other through heartbeats on an IPv4 multicast group
//! - The greatest announced timestamp identifies the valid shared value
//! - A lone peer elects itself once its bootstrap window closes
//! - Every peer serves the value it holds to TCP clients
//!
//! ## Architecture
//!
//! ```text
//!   multicast group (heartbeats)
//!        ▲            │
//!        │ frames     │ datagrams
//! ┌──────┴────────────▼──────┐     ┌──────────────┐
//! │   MulticastTransport     │     │   Acceptor   │◄── TCP clients
//! │   (send + receive task)  │     │ (accept task)│
//! └──────▲────────────┬──────┘     └──────┬───────┘
//!        │ outbound   │ heartbeats        │ connections
//! ┌──────┴────────────▼───────────────────▼───────┐
//! │ Coordinator (sole owner of PeerState)         │
//! │  tick / heartbeat / connection / fetched value│
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a long-lived node
//! ```bash
//! nds -n -p 31582
//! ```
//!
//! ### Publish a value, then read it from another host
//! ```bash
//! nds --set hello
//! nds --get
//! ```

pub mod common;
pub mod network;
pub mod peer;
pub mod wire;

// Re-export commonly used types
pub use common::{Error, PeerConfig, Result};
pub use peer::{Coordinator, Peer, PeerState};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
