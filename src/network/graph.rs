use std::{collections::HashMap, fmt::Display};

use petgraph::{
    Directed,
    dot::{Config, Dot},
    graph::NodeIndex,
    prelude::StableGraph,
};
use uuid::Uuid;

use crate::network::{mac::MacAddress, switch::Switch};

/// Vertex of the rendered topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphVertex {
    Switch { name: String },
    Port { switch: String, index: u32, name: String },
    Device { mac: MacAddress, label: String },
}

impl Display for GraphVertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphVertex::Switch { name } => write!(f, "Switch {}", name),
            GraphVertex::Port { name, .. } => write!(f, "Port {}", name),
            GraphVertex::Device { label, .. } => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEdge {
    /// Switch to one of its ports
    HasPort,
    /// Port to a device learned on it
    Learned,
    /// Port to another discovered switch
    Uplink,
}

impl Display for GraphEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphEdge::HasPort => write!(f, "port"),
            GraphEdge::Learned => write!(f, "learned"),
            GraphEdge::Uplink => write!(f, "uplink"),
        }
    }
}

/// A protocol-agnostic graph of one or more discovered switches.
///
/// Vertex ids are UUIDv5 so the same switch, port or device maps to the same vertex across
/// switches and across runs.
pub struct TopologyGraph {
    pub graph: StableGraph<GraphVertex, GraphEdge, Directed>,
    pub node_id_to_index_map: HashMap<Uuid, NodeIndex>,
}

impl TopologyGraph {
    /// Build a graph from populated switches. Ports without nodes are left out when
    /// `skip_empty_ports` is set.
    pub fn build_new(switches: &[Switch], skip_empty_ports: bool) -> Self {
        let mut this = Self {
            graph: StableGraph::new(),
            node_id_to_index_map: HashMap::new(),
        };

        let owners: HashMap<MacAddress, Uuid> = switches
            .iter()
            .flat_map(|sw| sw.macs.iter().map(move |mac| (*mac, sw.to_uuidv5())))
            .collect();

        for sw in switches {
            this.add_vertex(sw.to_uuidv5(), GraphVertex::Switch { name: sw.name.clone() });
        }

        for sw in switches {
            let switch_index = this.node_id_to_index_map[&sw.to_uuidv5()];
            for port in sw.ports.values() {
                if skip_empty_ports && port.nodes.is_empty() {
                    continue;
                }
                let port_id = Uuid::new_v5(
                    &Uuid::NAMESPACE_OID,
                    format!("port:{}:{}", sw.name, port.index).as_bytes(),
                );
                let port_index = this.add_vertex(
                    port_id,
                    GraphVertex::Port {
                        switch: sw.name.clone(),
                        index: port.index,
                        name: port.name.clone(),
                    },
                );
                this.graph.add_edge(switch_index, port_index, GraphEdge::HasPort);

                for node in port.sorted_nodes() {
                    match owners.get(&node.mac) {
                        Some(owner) if *owner != sw.to_uuidv5() => {
                            let owner_index = this.node_id_to_index_map[owner];
                            this.graph.add_edge(port_index, owner_index, GraphEdge::Uplink);
                        }
                        // A switch seeing its own address is not an edge
                        Some(_) => {}
                        None => {
                            let device_index = this.add_vertex(
                                node.to_uuidv5(),
                                GraphVertex::Device {
                                    mac: node.mac,
                                    label: node.label(),
                                },
                            );
                            this.graph.add_edge(port_index, device_index, GraphEdge::Learned);
                        }
                    }
                }
            }
        }
        this
    }

    /// Returns the existing vertex for `id` or inserts a new one.
    fn add_vertex(&mut self, id: Uuid, vertex: GraphVertex) -> NodeIndex {
        if let Some(index) = self.node_id_to_index_map.get(&id) {
            return *index;
        }
        let index = self.graph.add_node(vertex);
        self.node_id_to_index_map.insert(id, index);
        index
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Graphviz DOT text of the graph.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }
}
