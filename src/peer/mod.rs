//! Peer: arbitration state, coordinator loop and startup wiring

pub mod coordinator;
pub mod server;
pub mod state;

pub use coordinator::{Coordinator, CoordinatorQueues};
pub use server::Peer;
pub use state::{HeartbeatVerdict, PeerPhase, PeerState, TickAction};
