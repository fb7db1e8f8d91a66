use std::hash::{Hash, Hasher};

use serde::Serialize;
use uuid::Uuid;

use crate::network::mac::MacAddress;

/// A device seen in a switch's forwarding table.
///
/// Identity is the hardware address alone: two nodes with the same address are the same device,
/// whatever else they carry.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub mac: MacAddress,
    pub hostname: Option<String>,
    pub vlan: Option<u16>,
    /// Set when the address belongs to another discovered switch
    pub is_switch: bool,
}

impl Node {
    pub fn new(mac: MacAddress, hostname: Option<String>, vlan: Option<u16>) -> Self {
        Self {
            mac,
            hostname,
            vlan,
            is_switch: false,
        }
    }

    /// Hostname if one was resolved, otherwise the address.
    pub fn label(&self) -> String {
        self.hostname
            .clone()
            .unwrap_or_else(|| self.mac.format_hex())
    }

    pub fn to_uuidv5(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &self.mac.octets())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.mac == other.mac
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mac.hash(state);
    }
}
