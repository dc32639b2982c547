//! Host interface enumeration

use crate::common::{Error, Result};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

/// Addresses owned by this host, used to spot our own datagrams
#[derive(Debug, Clone, Default)]
pub struct LocalInterfaceSet {
    addrs: HashSet<IpAddr>,
}

impl LocalInterfaceSet {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.addrs.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl FromIterator<IpAddr> for LocalInterfaceSet {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}

/// Result of the one-time interface scan
#[derive(Debug, Clone)]
pub struct HostInterfaces {
    pub local: LocalInterfaceSet,
    /// First non-loopback IPv4 interface, used to join the group
    pub multicast_if: Option<Ipv4Addr>,
}

impl HostInterfaces {
    /// Enumerate the host's interfaces. Failure here is fatal to the transport.
    pub fn discover() -> Result<Self> {
        let ifaces = get_if_addrs::get_if_addrs()
            .map_err(|e| Error::InterfaceEnumeration(e.to_string()))?;

        for iface in &ifaces {
            tracing::debug!("registering host interface {} ({})", iface.name, iface.ip());
        }

        Ok(Self::from_addrs(ifaces.iter().map(|iface| iface.ip())))
    }

    /// Build from an ordered address list
    pub fn from_addrs<I: IntoIterator<Item = IpAddr>>(addrs: I) -> Self {
        let addrs: Vec<IpAddr> = addrs.into_iter().collect();
        let multicast_if = addrs.iter().find_map(|ip| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(*v4),
            _ => None,
        });

        Self {
            local: addrs.into_iter().collect(),
            multicast_if,
        }
    }
}
