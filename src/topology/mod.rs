/*!
Topology module

This module turns the tables an agent exposes into the switch/port/node model.

Structure:
- `oids`: The object identifiers read from agents.
- `policy`: Which interfaces become ports (`InterfacePolicy`).
- `hostname`: Address to IP/hostname map built from ARP tables, shared read-only by all switches.
- `discovery`: The per-switch engine joining interface, bridge port, VLAN and forwarding tables,
               plus `discover_all` for running many switches at once.
- `federation`: Cross-switch pass marking nodes that are other discovered switches.

Re-exports:
- `DiscoveryEngine`, `DiscoveryError`, `DiscoveryReport` and `DiscoveryOutcome`.
- `HostnameMap` and `collect_hostnames`.
*/

pub mod discovery;
pub mod federation;
pub mod hostname;
pub mod oids;
pub mod policy;

pub use discovery::{DiscoveryEngine, DiscoveryError, DiscoveryOutcome, DiscoveryReport};
pub use federation::mark_switch_nodes;
pub use hostname::{HostnameMap, collect_hostnames};
pub use policy::{InterfacePolicy, TypeSelection};
