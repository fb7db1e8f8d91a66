use std::collections::HashMap;

use tracing::debug;

use crate::network::{mac::MacAddress, switch::Switch};

/// Mark nodes that are really other discovered switches.
///
/// A node whose address is a local address of a different switch gets `is_switch` set, and that
/// switch's name as hostname when none was resolved. Returns the number of nodes marked.
pub fn mark_switch_nodes(switches: &mut [Switch]) -> usize {
    let owners: HashMap<MacAddress, String> = switches
        .iter()
        .flat_map(|s| s.macs.iter().map(|mac| (*mac, s.name.clone())))
        .collect();

    let mut marked = 0;
    for switch in switches.iter_mut() {
        for port in switch.ports.values_mut() {
            let nodes = std::mem::take(&mut port.nodes);
            for mut node in nodes {
                if let Some(owner) = owners.get(&node.mac)
                    && *owner != switch.name
                {
                    node.is_switch = true;
                    if node.hostname.is_none() {
                        node.hostname = Some(owner.clone());
                    }
                    debug!(switch = %switch.name, port = port.index, neighbour = %owner, "Switch seen on port");
                    marked += 1;
                }
                port.nodes.insert(node);
            }
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_aquisition::connection::Connection;
    use crate::network::{node::Node, switch::Port};

    fn switch(name: &str, own: MacAddress, seen: &[MacAddress]) -> Switch {
        let mut switch = Switch::new(name, Connection::v2c(name, "public"));
        switch.add_local_mac(own);
        let mut port = Port::new(1, "Gi0/1", own, true);
        for mac in seen {
            port.insert_node(Node::new(*mac, None, None));
        }
        switch.ports.insert(1, port);
        switch
    }

    #[test]
    fn test_marks_neighbouring_switches() {
        let a = MacAddress::new([0, 0, 0, 0, 0, 0xA]);
        let b = MacAddress::new([0, 0, 0, 0, 0, 0xB]);
        let host = MacAddress::new([0, 0, 0, 0, 0, 0x1]);
        let mut switches = vec![switch("sw-a", a, &[b, host, a]), switch("sw-b", b, &[a])];

        assert_eq!(mark_switch_nodes(&mut switches), 2);

        let node = |s: &Switch, mac: MacAddress| s.ports[&1].nodes.iter().find(|n| n.mac == mac).cloned().unwrap();
        let b_on_a = node(&switches[0], b);
        assert!(b_on_a.is_switch);
        assert_eq!(b_on_a.hostname.as_deref(), Some("sw-b"));
        assert!(!node(&switches[0], host).is_switch);
        // A switch's own address is not a neighbour
        assert!(!node(&switches[0], a).is_switch);
        assert!(node(&switches[1], a).is_switch);
    }

    #[test]
    fn test_keeps_resolved_hostname() {
        let a = MacAddress::new([0, 0, 0, 0, 0, 0xA]);
        let b = MacAddress::new([0, 0, 0, 0, 0, 0xB]);
        let mut sw_a = switch("sw-a", a, &[]);
        sw_a.ports
            .get_mut(&1)
            .unwrap()
            .insert_node(Node::new(b, Some("core.lan".into()), None));
        let mut switches = vec![sw_a, switch("sw-b", b, &[])];

        mark_switch_nodes(&mut switches);
        let node = switches[0].ports[&1].nodes.iter().next().unwrap();
        assert!(node.is_switch);
        assert_eq!(node.hostname.as_deref(), Some("core.lan"));
    }
}
