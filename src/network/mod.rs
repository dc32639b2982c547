//! Networking: multicast heartbeats, TCP acceptor, value fetch client

pub mod acceptor;
pub mod client;
pub mod interfaces;
pub mod multicast;

pub use acceptor::Acceptor;
pub use client::fetch_value;
pub use interfaces::{HostInterfaces, LocalInterfaceSet};
pub use multicast::MulticastTransport;
