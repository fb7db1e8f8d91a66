use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt::Display,
};

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::{
    data_aquisition::connection::Connection,
    network::{mac::MacAddress, node::Node},
};

/// A switch port that survived interface filtering.
#[derive(Debug, Clone, Serialize)]
pub struct Port {
    /// Interface index (`ifIndex`), unique within its switch
    pub index: u32,
    pub name: String,
    pub mac: MacAddress,
    pub up: bool,
    pub vlan: Option<u16>,
    #[serde(serialize_with = "serialize_nodes_sorted")]
    pub nodes: HashSet<Node>,
}

impl Port {
    pub fn new(index: u32, name: impl Into<String>, mac: MacAddress, up: bool) -> Self {
        Self {
            index,
            name: name.into(),
            mac,
            up,
            vlan: None,
            nodes: HashSet::new(),
        }
    }

    /// Attach a node. Returns false if a node with the same address was already attached.
    pub fn insert_node(&mut self, node: Node) -> bool {
        self.nodes.insert(node)
    }

    /// Attached nodes ordered by address.
    pub fn sorted_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.mac);
        nodes
    }
}

fn serialize_nodes_sorted<S: Serializer>(nodes: &HashSet<Node>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by_key(|n| n.mac);
    serializer.collect_seq(sorted)
}

fn serialize_agent<S: Serializer>(connection: &Connection, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&connection.agent())
}

/// A managed switch and everything discovery learned about it.
///
/// Created by the caller with an empty port map and filled in place by discovery.
#[derive(Debug, Clone, Serialize)]
pub struct Switch {
    pub name: String,
    #[serde(rename = "agent", serialize_with = "serialize_agent")]
    pub connection: Connection,
    /// Hardware addresses of the switch's own interfaces, without duplicates or the zero address
    pub macs: Vec<MacAddress>,
    pub ports: BTreeMap<u32, Port>,
    /// Known VLANs; empty for VLAN-unaware devices
    pub vlans: BTreeSet<u16>,
}

impl Switch {
    pub fn new(name: impl Into<String>, connection: Connection) -> Self {
        Self {
            name: name.into(),
            connection,
            macs: Vec::new(),
            ports: BTreeMap::new(),
            vlans: BTreeSet::new(),
        }
    }

    /// Record one of the switch's own addresses. The zero address is never recorded.
    pub fn add_local_mac(&mut self, mac: MacAddress) {
        if !mac.is_zero() && !self.macs.contains(&mac) {
            self.macs.push(mac);
        }
    }

    pub fn owns_mac(&self, mac: &MacAddress) -> bool {
        self.macs.contains(mac)
    }

    /// Forwarding contexts to walk: every known VLAN, or the single default context.
    pub fn vlan_contexts(&self) -> Vec<Option<u16>> {
        if self.vlans.is_empty() {
            vec![None]
        } else {
            self.vlans.iter().copied().map(Some).collect()
        }
    }

    pub fn node_count(&self) -> usize {
        self.ports.values().map(|p| p.nodes.len()).sum()
    }

    pub fn to_uuidv5(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("switch:{}", self.name).as_bytes())
    }
}

impl Display for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Switch {} ({})", self.name, self.connection.agent())?;
        write!(
            f,
            "\nMACs: {}",
            self.macs
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        for port in self.ports.values() {
            write!(
                f,
                "\n  [{}] {} {} ({} nodes)",
                port.index,
                port.name,
                if port.up { "up" } else { "down" },
                port.nodes.len()
            )?;
        }
        Ok(())
    }
}
