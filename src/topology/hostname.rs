use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
};

use dns_lookup::lookup_addr;
use tracing::{debug, info, warn};

use crate::data_aquisition::{
    connection::Connection,
    core::{SnmpTransport, TransportError, VarBind},
};
use crate::network::mac::MacAddress;
use crate::topology::{
    discovery::DiscoveryError,
    oids::{IP_NET_TO_MEDIA_NET_ADDRESS, IP_NET_TO_MEDIA_PHYS_ADDRESS},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub ip: Ipv4Addr,
    /// Reverse DNS name, if looked up and found
    pub hostname: Option<String>,
}

impl HostEntry {
    /// Hostname if known, otherwise the IP address.
    pub fn label(&self) -> String {
        self.hostname.clone().unwrap_or_else(|| self.ip.to_string())
    }
}

/// Hardware address to IP/hostname map built from agents' ARP tables.
///
/// Built once before discovery and only read afterwards, so it can be shared between switches.
/// If several agents report the same address, the last one read wins.
#[derive(Debug, Clone, Default)]
pub struct HostnameMap {
    by_mac: HashMap<MacAddress, HostEntry>,
}

impl HostnameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry.
    pub fn insert(&mut self, mac: MacAddress, entry: HostEntry) {
        self.by_mac.insert(mac, entry);
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&HostEntry> {
        self.by_mac.get(mac)
    }

    /// Name to show for `mac`: hostname, else IP, else nothing.
    pub fn lookup(&self, mac: &MacAddress) -> Option<String> {
        self.by_mac.get(mac).map(HostEntry::label)
    }

    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    pub fn merge(&mut self, other: HostnameMap) {
        self.by_mac.extend(other.by_mac);
    }

    /// Build from the address column alone, taking each IP from the row index
    /// (`ifIndex.a.b.c.d`). Returns `None` if any row's index does not end in an IPv4 address.
    pub fn from_indexed_rows(phys: &[VarBind]) -> Option<Self> {
        let mut map = Self::new();
        for vb in phys {
            let ip = vb
                .index_suffix(IP_NET_TO_MEDIA_PHYS_ADDRESS)
                .and_then(|suffix| ipv4_from_suffix(&suffix))?;
            match vb.value.as_address() {
                Some(mac) if !mac.is_zero() => map.insert(mac, HostEntry { ip, hostname: None }),
                _ => debug!(oid = %vb.oid, value = ?vb.value, "ARP entry without a usable address"),
            }
        }
        Some(map)
    }

    /// Build by pairing the address and IP columns row by row.
    ///
    /// This assumes both walks came back in the same order; columns of different length mean
    /// the table changed or was cut short, and nothing is paired.
    pub fn from_columns(phys: &[VarBind], net: &[VarBind]) -> Result<Self, DiscoveryError> {
        if phys.len() != net.len() {
            return Err(DiscoveryError::InconsistentTable {
                table: "ipNetToMediaTable",
                detail: format!("{} addresses but {} IPs", phys.len(), net.len()),
            });
        }
        let mut map = Self::new();
        for (mac_vb, ip_vb) in phys.iter().zip(net) {
            let mac = mac_vb.value.as_address().filter(|mac| !mac.is_zero());
            let ip = ip_vb.value.as_text().and_then(|s| s.parse::<Ipv4Addr>().ok());
            match (mac, ip) {
                (Some(mac), Some(ip)) => map.insert(mac, HostEntry { ip, hostname: None }),
                _ => debug!(mac_oid = %mac_vb.oid, ip_oid = %ip_vb.oid, "Skipping unpaired ARP row"),
            }
        }
        Ok(map)
    }

    /// Read one agent's ARP table.
    pub async fn collect<T>(transport: &T, connection: &Connection) -> Result<Self, DiscoveryError>
    where
        T: SnmpTransport + ?Sized,
    {
        let phys = transport.walk(connection, IP_NET_TO_MEDIA_PHYS_ADDRESS).await?;
        if let Some(map) = Self::from_indexed_rows(&phys) {
            return Ok(map);
        }
        debug!(agent = %connection.agent(), "ARP index has no IPv4 suffix, pairing columns");
        let net = transport.walk(connection, IP_NET_TO_MEDIA_NET_ADDRESS).await?;
        Self::from_columns(&phys, &net)
    }

    /// Fill in hostnames by reverse DNS. Lookups run on the blocking pool.
    pub async fn resolve_reverse_dns(&mut self) {
        let ips: Vec<Ipv4Addr> = self.by_mac.values().map(|e| e.ip).collect();
        let mut names: HashMap<Ipv4Addr, String> = HashMap::new();
        for ip in ips {
            if names.contains_key(&ip) {
                continue;
            }
            let resolved = tokio::task::spawn_blocking(move || reverse_lookup(ip))
                .await
                .ok()
                .flatten();
            if let Some(name) = resolved {
                names.insert(ip, name);
            }
        }
        for entry in self.by_mac.values_mut() {
            if let Some(name) = names.get(&entry.ip) {
                entry.hostname = Some(name.clone());
            }
        }
        debug!(resolved = names.len(), "Reverse DNS finished");
    }
}

/// Reverse DNS for one address. An answer that is just the address again counts as no answer.
pub fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    match lookup_addr(&IpAddr::V4(ip)) {
        Ok(hostname) if hostname != ip.to_string() => Some(hostname),
        _ => None,
    }
}

fn ipv4_from_suffix(suffix: &[u64]) -> Option<Ipv4Addr> {
    if suffix.len() < 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (octet, component) in octets.iter_mut().zip(&suffix[suffix.len() - 4..]) {
        *octet = u8::try_from(*component).ok()?;
    }
    Some(Ipv4Addr::from(octets))
}

/// Build the shared map from every agent in `connections`.
///
/// An agent whose table cannot be read or is inconsistent is logged and left out; the map is an
/// enrichment and never stops discovery.
pub async fn collect_hostnames<T>(transport: &T, connections: &[Connection], reverse_dns: bool) -> HostnameMap
where
    T: SnmpTransport + ?Sized,
{
    let mut map = HostnameMap::new();
    for connection in connections {
        match HostnameMap::collect(transport, connection).await {
            Ok(part) => {
                debug!(agent = %connection.agent(), entries = part.len(), "ARP table read");
                map.merge(part);
            }
            Err(DiscoveryError::Transport(TransportError::Timeout { agent })) => {
                warn!(agent = %agent, "ARP table walk timed out, skipping agent");
            }
            Err(e) => warn!(agent = %connection.agent(), error = %e, "Skipping ARP table"),
        }
    }
    if reverse_dns {
        map.resolve_reverse_dns().await;
    }
    info!(entries = map.len(), "Hostname map built");
    map
}
