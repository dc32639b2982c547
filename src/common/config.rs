//! Configuration for an nds peer

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix (`NDS_LISTEN_PORT=31600`, ...)
pub const ENV_PREFIX: &str = "NDS";

/// Peer configuration, read once at startup and never mutated afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Long-lived node (true) or one-shot setter/getter (false)
    #[serde(default)]
    pub start_node: bool,

    /// Multicast group joined for heartbeats
    #[serde(default = "default_multicast_addr")]
    pub multicast_addr: Ipv4Addr,

    /// Multicast port
    #[serde(default = "default_multicast_port")]
    pub multicast_port: u16,

    /// Address the TCP acceptor binds to
    #[serde(default = "default_bind_ip")]
    pub bind_ip: Ipv4Addr,

    /// First TCP port tried by the acceptor
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Value to publish to the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Read the current cluster value
    #[serde(default)]
    pub get_value: bool,

    /// Bootstrap synchronization window
    #[serde(default = "default_sync_window")]
    pub sync_window_ms: u64,

    /// Coordinator tick period
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Timeout applied to value fetches and client writes
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// "console" or a log file path
    #[serde(default = "default_log_target")]
    pub log_target: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_multicast_addr() -> Ipv4Addr {
    Ipv4Addr::new(232, 232, 200, 82)
}
fn default_multicast_port() -> u16 {
    8745
}
fn default_bind_ip() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}
fn default_listen_port() -> u16 {
    31582
}
fn default_sync_window() -> u64 {
    2_000
}
fn default_tick_interval() -> u64 {
    2_000
}
fn default_fetch_timeout() -> u64 {
    1_000
}
fn default_log_target() -> String {
    "console".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            start_node: false,
            multicast_addr: default_multicast_addr(),
            multicast_port: default_multicast_port(),
            bind_ip: default_bind_ip(),
            listen_port: default_listen_port(),
            value: None,
            get_value: false,
            sync_window_ms: default_sync_window(),
            tick_interval_ms: default_tick_interval(),
            fetch_timeout_ms: default_fetch_timeout(),
            log_target: default_log_target(),
            log_level: default_log_level(),
        }
    }
}

impl PeerConfig {
    /// Load from an optional TOML file, then `NDS_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: PeerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.multicast_addr.is_multicast() {
            return Err(Error::InvalidConfig(format!(
                "{} is not a multicast address",
                self.multicast_addr
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig("tick interval must be non-zero".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfig("fetch timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Value to publish at startup, if any. An empty string publishes nothing.
    pub fn publish_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    pub fn sync_window(&self) -> Duration {
        Duration::from_millis(self.sync_window_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
