//! Common utilities and types shared across nds

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::PeerConfig;
pub use error::{Error, Result};
pub use logging::{init_logging, LogSink};
pub use utils::timestamp_now;
