//! Station connectivity graph.
//!
//! The production line only ever asks two things of the graph: resolve a
//! station to its node, and list the edges feeding into a node. Edge
//! payloads (the allowed-SKU lists) live in the production line, keyed by
//! [`EdgeId`], not here.

use crate::id::{EdgeId, NodeId, StationId};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

/// Errors from graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("station {0} is not in the graph")]
    StationNotFound(StationId),
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeId),
}

/// Per-node data.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub station: StationId,
}

/// Per-edge data: a feeder relationship from `from` into `to`.
#[derive(Debug, Clone, Copy)]
pub struct EdgeData {
    pub from: NodeId,
    pub to: NodeId,
}

/// Adjacency for one node. Only inbound edges are tracked; the line never
/// walks outbound.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    inbound: Vec<EdgeId>,
}

/// A directed graph over station ids.
#[derive(Debug, Default)]
pub struct StationGraph {
    nodes: SlotMap<NodeId, NodeData>,
    edges: SlotMap<EdgeId, EdgeData>,
    adjacency: SecondaryMap<NodeId, NodeAdjacency>,
    station_to_node: HashMap<StationId, NodeId>,
}

impl StationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for a station. Adding the same station twice returns the
    /// existing node.
    pub fn add_node(&mut self, station: StationId) -> NodeId {
        if let Some(node) = self.station_to_node.get(&station) {
            return *node;
        }
        let node = self.nodes.insert(NodeData { station });
        self.adjacency.insert(node, NodeAdjacency::default());
        self.station_to_node.insert(station, node);
        node
    }

    /// Connect a feeder station into a destination station.
    pub fn connect(&mut self, from: StationId, to: StationId) -> Result<EdgeId, GraphError> {
        let from_node = self.node_for(from)?;
        let to_node = self.node_for(to)?;
        let edge = self.edges.insert(EdgeData {
            from: from_node,
            to: to_node,
        });
        if let Some(adj) = self.adjacency.get_mut(to_node) {
            adj.inbound.push(edge);
        }
        Ok(edge)
    }

    /// Resolve a station id to its node.
    pub fn node_for(&self, station: StationId) -> Result<NodeId, GraphError> {
        self.station_to_node
            .get(&station)
            .copied()
            .ok_or(GraphError::StationNotFound(station))
    }

    /// Edges whose destination is this node, in insertion order.
    pub fn inbound_edges(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.inbound.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge(&self, edge: EdgeId) -> Result<EdgeData, GraphError> {
        self.edges
            .get(edge)
            .copied()
            .ok_or(GraphError::EdgeNotFound(edge))
    }

    pub fn station_at(&self, node: NodeId) -> Result<StationId, GraphError> {
        self.nodes
            .get(node)
            .map(|data| data.station)
            .ok_or(GraphError::NodeNotFound(node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
