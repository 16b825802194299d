//! NodeStore: the host-side node store the pipeline commits into

use super::node::{Node, NodeId};
use dashmap::DashMap;
use serde_json::Value;

/// Concurrent node store owned by the host content pipeline.
///
/// Nodes are keyed by identity; writing an existing identity replaces it.
#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: DashMap<NodeId, Node>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Create or replace a node.
    ///
    /// Returns `true` when a node with the same identity was replaced.
    pub fn create_node(&self, node: Node) -> bool {
        self.nodes.insert(node.id, node).is_some()
    }

    /// Attach a derived field to an existing node.
    ///
    /// Returns `false` if the node does not exist.
    pub fn create_node_field(&self, id: &NodeId, name: impl Into<String>, value: Value) -> bool {
        match self.nodes.get_mut(id) {
            Some(mut node) => {
                node.fields.insert(name.into(), value);
                true
            }
            None => false,
        }
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).map(|r| r.clone())
    }

    /// All nodes of a concrete type, ordered by identity
    pub fn nodes_by_type(&self, node_type: &str) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|r| r.node_type() == node_type)
            .map(|r| r.clone())
            .collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    /// Snapshot of every node, ordered by identity
    pub fn all_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.iter().map(|r| r.clone()).collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
