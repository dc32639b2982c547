//! nds peer binary

use clap::Parser;
use nds::common::{init_logging, PeerConfig};
use nds::Peer;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nds")]
#[command(about = "Multicast peer discovery and single-value synchronization")]
#[command(version)]
struct Args {
    /// Spawn a long-lived node
    #[arg(short = 'n', long = "node")]
    node: bool,

    /// Join the cluster at this multicast group
    #[arg(short = 'j', long = "join")]
    join: Option<Ipv4Addr>,

    /// Multicast port
    #[arg(long = "jp")]
    join_port: Option<u16>,

    /// Listen on this TCP port (the next free one is used if busy)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Logging target: console or a file name
    #[arg(short = 'l', long = "log")]
    log: Option<String>,

    /// Logging verbosity (off, trace, debug, info, warn, err)
    #[arg(short = 'v', long = "verbosity")]
    verbosity: Option<String>,

    /// Set the value shared across the cluster
    #[arg(long = "set")]
    set: Option<String>,

    /// Get the value shared across the cluster
    #[arg(long = "get")]
    get: bool,

    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

impl Args {
    /// CLI flags take priority over file and environment settings
    fn apply(self, config: &mut PeerConfig) {
        config.start_node |= self.node;
        config.get_value |= self.get;
        if let Some(group) = self.join {
            config.multicast_addr = group;
        }
        if let Some(port) = self.join_port {
            config.multicast_port = port;
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(log) = self.log {
            config.log_target = log;
        }
        if let Some(level) = self.verbosity {
            config.log_level = level;
        }
        if self.set.is_some() {
            config.value = self.set;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = PeerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.log_target, &config.log_level)?;

    let get_value = config.get_value;
    let state = Peer::new(config).run().await?;

    if get_value {
        if state.current_timestamp() == 0 {
            println!("no value available");
        } else {
            println!("{} (ts {})", state.value(), state.current_timestamp());
        }
    }

    Ok(())
}
