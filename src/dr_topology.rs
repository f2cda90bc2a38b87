//! Dual-ring topology
//!
//! Outer ring nodes come first (ids `0..outer`), inner ring nodes follow.
//! Neighbour sets keep insertion order. Pairs are visited in ascending id
//! order, so every set ends up sorted and broadcasts visit neighbours in the
//! same order on every run.

use indexmap::IndexSet;
use serde::Serialize;

use crate::dr_config::TopologyConfig;
use crate::dr_interface::{NodeId, Position, Ring};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub label: String,
    pub ring: Ring,
    pub position: Position,
}

/// Shape of the built network, reported with every result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySummary {
    pub total_nodes: usize,
    pub outer_nodes: usize,
    pub inner_nodes: usize,
    pub min_degree: usize,
    pub max_degree: usize,
    pub avg_degree: f64,
    pub isolated_nodes: usize,
}

#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<NodeSpec>,
    neighbors: Vec<IndexSet<NodeId>>,
    sensor_range: f64,
    p2p_range: f64,
}

/// Points evenly spaced on a circle, starting at `offset_deg`
pub fn ring_positions(count: usize, radius: f64, offset_deg: f64) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let spacing = 360.0 / count as f64;
    (0..count)
        .map(|i| {
            let angle = (i as f64 * spacing + offset_deg).to_radians();
            Position::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

impl Topology {
    pub fn build(config: &TopologyConfig) -> Self {
        let outer = ring_positions(config.outer_ring_nodes, config.outer_ring_radius, 0.0);
        let inner = ring_positions(
            config.inner_ring_nodes,
            config.inner_ring_radius,
            config.inner_ring_offset_deg,
        );

        let mut nodes = Vec::with_capacity(outer.len() + inner.len());
        for (i, position) in outer.into_iter().enumerate() {
            nodes.push(NodeSpec {
                id: nodes.len(),
                label: format!("outer_{}", i),
                ring: Ring::Outer,
                position,
            });
        }
        for (i, position) in inner.into_iter().enumerate() {
            nodes.push(NodeSpec {
                id: nodes.len(),
                label: format!("inner_{}", i),
                ring: Ring::Inner,
                position,
            });
        }

        Self::from_nodes(nodes, config.sensor_range, config.p2p_range)
    }

    /// Build from explicit placements. Ids are reassigned to match vector order.
    pub fn from_nodes(mut nodes: Vec<NodeSpec>, sensor_range: f64, p2p_range: f64) -> Self {
        for (i, node) in nodes.iter_mut().enumerate() {
            node.id = i;
        }

        let mut neighbors = vec![IndexSet::new(); nodes.len()];
        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                if nodes[a].position.distance(&nodes[b].position) <= p2p_range {
                    neighbors[a].insert(b);
                    neighbors[b].insert(a);
                }
            }
        }
        Self {
            nodes,
            neighbors,
            sensor_range,
            p2p_range,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    pub fn sensor_range(&self) -> f64 {
        self.sensor_range
    }

    pub fn p2p_range(&self) -> f64 {
        self.p2p_range
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors.get(id).into_iter().flatten().copied()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors.get(id).map_or(0, |set| set.len())
    }

    pub fn are_neighbors(&self, a: NodeId, b: NodeId) -> bool {
        self.neighbors.get(a).is_some_and(|set| set.contains(&b))
    }

    pub fn distance(&self, a: NodeId, b: NodeId) -> Option<f64> {
        Some(self.node(a)?.position.distance(&self.node(b)?.position))
    }

    /// Nodes whose sensors cover `origin`, in ascending id order
    pub fn nodes_in_sensor_range(&self, origin: Position) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(move |node| node.position.distance(&origin) <= self.sensor_range)
            .map(|node| node.id)
    }

    /// A in neighbors(B) iff B in neighbors(A), and nobody neighbours itself
    pub fn is_symmetric(&self) -> bool {
        self.neighbors.iter().enumerate().all(|(a, set)| {
            !set.contains(&a) && set.iter().all(|&b| self.are_neighbors(b, a))
        })
    }

    pub fn summary(&self) -> TopologySummary {
        let degrees: Vec<usize> = (0..self.len()).map(|id| self.degree(id)).collect();
        let total: usize = degrees.iter().sum();
        TopologySummary {
            total_nodes: self.len(),
            outer_nodes: self.nodes.iter().filter(|n| n.ring == Ring::Outer).count(),
            inner_nodes: self.nodes.iter().filter(|n| n.ring == Ring::Inner).count(),
            min_degree: degrees.iter().copied().min().unwrap_or(0),
            max_degree: degrees.iter().copied().max().unwrap_or(0),
            avg_degree: if degrees.is_empty() {
                0.0
            } else {
                total as f64 / degrees.len() as f64
            },
            isolated_nodes: degrees.iter().filter(|&&d| d == 0).count(),
        }
    }
}
