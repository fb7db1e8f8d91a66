use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::data_aquisition::{
    connection::Connection,
    core::{SnmpTransport, SnmpValue, TransportError, VarBind},
};
use crate::network::{
    mac::MacAddress,
    node::Node,
    switch::{Port, Switch},
};
use crate::topology::{
    hostname::HostnameMap,
    oids::{
        DOT1D_BASE_PORT, DOT1D_BASE_PORT_IF_INDEX, DOT1D_TP_FDB_ADDRESS, DOT1D_TP_FDB_PORT,
        DOT1D_TP_FDB_STATUS, FDB_STATUS_LEARNED, FDB_STATUS_SELF, IF_DESCR, IF_INDEX,
        IF_OPER_STATUS, IF_PHYS_ADDRESS, IF_TYPE, OPER_STATUS_UP, VM_VLAN, VTP_VLAN_STATE,
        instance,
    },
    policy::InterfacePolicy,
};

/// Reserved FDDI/Token Ring VLANs. Their forwarding context cannot be selected by community.
pub const DEFAULT_SKIP_VLANS: [u16; 4] = [1002, 1003, 1004, 1005];

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Inconsistent {table}: {detail}")]
    InconsistentTable { table: &'static str, detail: String },
    #[error("Discovery aborted: {0}")]
    Aborted(String),
}

/// What one discovery pass saw and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub ports_kept: usize,
    pub ports_skipped: usize,
    pub vlan_contexts: usize,
    /// Rows read from the forwarding address column, over all contexts
    pub fdb_entries: usize,
    /// Rows on a known port with status learned or self
    pub learned_entries: usize,
    pub nodes_attached: usize,
    pub discarded_unknown_port: usize,
    pub discarded_status: usize,
    pub discarded_malformed: usize,
}

/// Result of discovering one switch. The switch holds whatever was learned before a failure.
#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub switch: Switch,
    pub result: Result<DiscoveryReport, DiscoveryError>,
}

/// Fills switches in from their agents' interface, bridge and forwarding tables.
pub struct DiscoveryEngine<T: SnmpTransport + ?Sized> {
    transport: Arc<T>,
    policy: InterfacePolicy,
    skip_vlans: BTreeSet<u16>,
}

impl<T: SnmpTransport + ?Sized> Clone for DiscoveryEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            policy: self.policy.clone(),
            skip_vlans: self.skip_vlans.clone(),
        }
    }
}

impl<T: SnmpTransport + ?Sized> DiscoveryEngine<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            policy: InterfacePolicy::default(),
            skip_vlans: DEFAULT_SKIP_VLANS.into_iter().collect(),
        }
    }

    pub fn with_policy(mut self, policy: InterfacePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_skip_vlans(mut self, vlans: impl IntoIterator<Item = u16>) -> Self {
        self.skip_vlans = vlans.into_iter().collect();
        self
    }

    pub fn policy(&self) -> &InterfacePolicy {
        &self.policy
    }

    /// Populate `switch` in place: ports, local addresses, VLANs and attached nodes.
    ///
    /// A transport failure aborts this switch and is returned; what was filled in before it
    /// stays on the switch.
    pub async fn discover(
        &self,
        switch: &mut Switch,
        hostnames: &HostnameMap,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        info!(switch = %switch.name, agent = %switch.connection.agent(), "Discovering switch");
        let mut report = DiscoveryReport::default();

        self.collect_ports(switch, &mut report).await?;
        let bridge_ports = self.bridge_port_map(&switch.connection).await?;
        debug!(switch = %switch.name, bridge_ports = bridge_ports.len(), "Bridge port map read");
        self.collect_vlans(switch).await?;

        for vlan in switch.vlan_contexts() {
            report.vlan_contexts += 1;
            self.walk_forwarding_table(switch, vlan, &bridge_ports, hostnames, &mut report)
                .await?;
        }

        info!(
            switch = %switch.name,
            ports = report.ports_kept,
            vlans = switch.vlans.len(),
            nodes = report.nodes_attached,
            "Discovery finished"
        );
        Ok(report)
    }

    async fn fetch_column(
        &self,
        connection: &Connection,
        column: &str,
        index: impl std::fmt::Display,
    ) -> Result<SnmpValue, TransportError> {
        self.transport.fetch(connection, &instance(column, index)).await
    }

    async fn collect_ports(
        &self,
        switch: &mut Switch,
        report: &mut DiscoveryReport,
    ) -> Result<(), DiscoveryError> {
        let connection = switch.connection.clone();
        for vb in self.transport.walk(&connection, IF_INDEX).await? {
            let Some(index) = vb.value.as_integer().and_then(|i| u32::try_from(i).ok()) else {
                warn!(oid = %vb.oid, value = ?vb.value, "Skipping malformed ifIndex");
                continue;
            };

            let if_type = self.fetch_column(&connection, IF_TYPE, index).await?.as_integer();
            if !self.policy.admits_type(if_type) {
                debug!(switch = %switch.name, index, ?if_type, "Interface type not admitted");
                report.ports_skipped += 1;
                continue;
            }

            let oper_status = self
                .fetch_column(&connection, IF_OPER_STATUS, index)
                .await?
                .as_integer();
            if !self.policy.admits_status(oper_status) {
                debug!(switch = %switch.name, index, ?oper_status, "Interface not up");
                report.ports_skipped += 1;
                continue;
            }

            let mac = phys_address(&self.fetch_column(&connection, IF_PHYS_ADDRESS, index).await?);
            let name = self
                .fetch_column(&connection, IF_DESCR, index)
                .await?
                .to_display_string()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("ifIndex {}", index));

            let up = oper_status == Some(OPER_STATUS_UP);
            switch.add_local_mac(mac);
            // Re-running discovery refreshes a port but keeps its nodes
            match switch.ports.get_mut(&index) {
                Some(port) => {
                    port.name = name;
                    port.mac = mac;
                    port.up = up;
                }
                None => {
                    switch.ports.insert(index, Port::new(index, name, mac, up));
                }
            }
            report.ports_kept += 1;
        }
        debug!(switch = %switch.name, kept = report.ports_kept, skipped = report.ports_skipped, "Interfaces read");
        Ok(())
    }

    /// Bridge port number to ifIndex, from the base port table.
    async fn bridge_port_map(&self, connection: &Connection) -> Result<HashMap<u64, u32>, DiscoveryError> {
        let mut map = HashMap::new();
        for vb in self.transport.walk(connection, DOT1D_BASE_PORT).await? {
            let Some(bridge_port) = vb.value.as_integer().and_then(|p| u64::try_from(p).ok()) else {
                warn!(oid = %vb.oid, value = ?vb.value, "Skipping malformed bridge port");
                continue;
            };
            match self.bridge_port_if_index(connection, bridge_port).await? {
                Some(if_index) => {
                    map.insert(bridge_port, if_index);
                }
                None => debug!(bridge_port, "Bridge port has no ifIndex"),
            }
        }
        Ok(map)
    }

    async fn bridge_port_if_index(
        &self,
        connection: &Connection,
        bridge_port: u64,
    ) -> Result<Option<u32>, TransportError> {
        Ok(self
            .fetch_column(connection, DOT1D_BASE_PORT_IF_INDEX, bridge_port)
            .await?
            .as_integer()
            .and_then(|i| u32::try_from(i).ok()))
    }

    async fn collect_vlans(&self, switch: &mut Switch) -> Result<(), DiscoveryError> {
        let connection = switch.connection.clone();
        for vb in self.transport.walk(&connection, VTP_VLAN_STATE).await? {
            let Some(vlan) = vb.last_component().and_then(|c| u16::try_from(c).ok()) else {
                warn!(oid = %vb.oid, "Skipping malformed VLAN row");
                continue;
            };
            if self.skip_vlans.contains(&vlan) {
                debug!(switch = %switch.name, vlan, "Skipping reserved VLAN");
                continue;
            }
            switch.vlans.insert(vlan);
        }

        if switch.vlans.is_empty() {
            debug!(switch = %switch.name, "No VLAN table, using the default forwarding context");
            return Ok(());
        }

        for port in switch.ports.values_mut() {
            if port.vlan.is_some() {
                continue;
            }
            port.vlan = self
                .fetch_column(&connection, VM_VLAN, port.index)
                .await?
                .as_integer()
                .and_then(|v| u16::try_from(v).ok());
        }
        debug!(switch = %switch.name, vlans = ?switch.vlans, "VLANs read");
        Ok(())
    }

    async fn walk_forwarding_table(
        &self,
        switch: &mut Switch,
        vlan: Option<u16>,
        base_bridge_ports: &HashMap<u64, u32>,
        hostnames: &HostnameMap,
        report: &mut DiscoveryReport,
    ) -> Result<(), DiscoveryError> {
        let connection = switch.connection.for_vlan(vlan);
        let result = self
            .attach_forwarding_entries(switch, &connection, vlan, base_bridge_ports, hostnames, report)
            .await;
        // Each VLAN context has its own community, and is not asked again
        if connection != switch.connection {
            self.transport.release(&connection).await;
        }
        result
    }

    async fn attach_forwarding_entries(
        &self,
        switch: &mut Switch,
        connection: &Connection,
        vlan: Option<u16>,
        base_bridge_ports: &HashMap<u64, u32>,
        hostnames: &HostnameMap,
        report: &mut DiscoveryReport,
    ) -> Result<(), DiscoveryError> {
        let mut bridge_ports = base_bridge_ports.clone();
        let mut unknown_bridge_ports: HashSet<u64> = HashSet::new();

        let entries = self.transport.walk(connection, DOT1D_TP_FDB_ADDRESS).await?;
        debug!(switch = %switch.name, ?vlan, entries = entries.len(), "Forwarding table read");

        for vb in entries {
            report.fdb_entries += 1;
            let Some(mac) = fdb_address(&vb) else {
                warn!(oid = %vb.oid, value = ?vb.value, "Forwarding entry without a usable address");
                report.discarded_malformed += 1;
                continue;
            };
            let row = mac.format_decimal();

            let bridge_port = self
                .fetch_column(connection, DOT1D_TP_FDB_PORT, &row)
                .await?
                .as_integer()
                .and_then(|p| u64::try_from(p).ok());
            let Some(bridge_port) = bridge_port else {
                warn!(%mac, ?vlan, "Forwarding entry without a bridge port");
                report.discarded_malformed += 1;
                continue;
            };

            // Some bridges number ports per VLAN instance, ask that context once.
            if !bridge_ports.contains_key(&bridge_port) && unknown_bridge_ports.insert(bridge_port) {
                if let Some(if_index) = self.bridge_port_if_index(connection, bridge_port).await? {
                    bridge_ports.insert(bridge_port, if_index);
                }
            }

            let port_index = bridge_ports
                .get(&bridge_port)
                .copied()
                .filter(|index| switch.ports.contains_key(index));
            let Some(port_index) = port_index else {
                debug!(%mac, bridge_port, ?vlan, "Entry on an unknown or filtered port");
                report.discarded_unknown_port += 1;
                continue;
            };

            let status = self
                .fetch_column(connection, DOT1D_TP_FDB_STATUS, &row)
                .await?
                .as_integer();
            if !matches!(status, Some(FDB_STATUS_LEARNED | FDB_STATUS_SELF)) {
                debug!(%mac, ?status, "Entry is neither learned nor static");
                report.discarded_status += 1;
                continue;
            }
            report.learned_entries += 1;

            if let Some(port) = switch.ports.get_mut(&port_index) {
                let node = Node::new(mac, hostnames.lookup(&mac), vlan.or(port.vlan));
                if port.insert_node(node) {
                    report.nodes_attached += 1;
                }
            }
        }
        Ok(())
    }
}

impl<T: SnmpTransport + ?Sized + 'static> DiscoveryEngine<T> {
    /// Discover independent switches concurrently, at most `concurrency` at a time.
    ///
    /// Every task owns its switch; only the hostname map is shared. Outcomes come back in input
    /// order, failed switches included.
    pub async fn discover_all(
        &self,
        switches: Vec<Switch>,
        hostnames: Arc<HostnameMap>,
        concurrency: usize,
    ) -> Vec<DiscoveryOutcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut fallbacks = Vec::with_capacity(switches.len());

        for (position, mut switch) in switches.into_iter().enumerate() {
            fallbacks.push(Switch::new(switch.name.clone(), switch.connection.clone()));
            let engine = self.clone();
            let hostnames = Arc::clone(&hostnames);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => engine.discover(&mut switch, &hostnames).await,
                    Err(e) => Err(DiscoveryError::Aborted(e.to_string())),
                };
                (position, DiscoveryOutcome { switch, result })
            });
        }

        let mut outcomes: Vec<Option<DiscoveryOutcome>> = fallbacks.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => {
                    if let Err(e) = &outcome.result {
                        warn!(switch = %outcome.switch.name, error = %e, "Discovery failed");
                    }
                    outcomes[position] = Some(outcome);
                }
                Err(e) => error!(error = %e, "Discovery task failed"),
            }
        }

        outcomes
            .into_iter()
            .zip(fallbacks)
            .map(|(outcome, switch)| {
                outcome.unwrap_or_else(|| DiscoveryOutcome {
                    switch,
                    result: Err(DiscoveryError::Aborted("discovery task did not complete".to_string())),
                })
            })
            .collect()
    }
}

/// ifPhysAddress as an address. Six octets that happen to be printable decode as text.
fn phys_address(value: &SnmpValue) -> MacAddress {
    match value {
        SnmpValue::Text(text) => MacAddress::try_from(text.as_bytes()).unwrap_or(MacAddress::ZERO),
        other => other.as_address().unwrap_or(MacAddress::ZERO),
    }
}

/// The entry's address, from its value or else from its row index.
fn fdb_address(vb: &VarBind) -> Option<MacAddress> {
    vb.value
        .as_address()
        .filter(|mac| !mac.is_zero())
        .or_else(|| {
            vb.index_suffix(DOT1D_TP_FDB_ADDRESS)
                .and_then(|suffix| MacAddress::from_oid_suffix(&suffix))
        })
}
