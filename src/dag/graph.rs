// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use crate::dag::node::BuildNode;

/// Handle on a node inside a [`BuildGraph`] arena.
pub type NodeId = NodeIndex;

/// Arena of Build Nodes for one session, rooted at the target.
///
/// Nodes live in a petgraph `DiGraph` with one edge per dependency, pointing
/// from the dependent to the dependency. A module reachable through several
/// parents has exactly one node, so every parent observes the same status.
/// Membership is fixed once constructed.
#[derive(Debug)]
pub struct BuildGraph {
    graph: DiGraph<BuildNode, ()>,
    target: NodeId,
    by_name: HashMap<String, NodeId>,
    /// Every node, dependencies before dependents.
    order: Vec<NodeId>,
}

impl BuildGraph {
    /// Assemble the arena. Callers must have already proven the dependency
    /// structure acyclic; see [`crate::dag::resolve`].
    pub(crate) fn from_arena(graph: DiGraph<BuildNode, ()>, target: NodeId) -> Self {
        let by_name = graph
            .node_indices()
            .map(|id| (graph[id].module_name().to_string(), id))
            .collect();

        let mut order = Vec::with_capacity(graph.node_count());
        let mut dfs = DfsPostOrder::new(&graph, target);
        while let Some(id) = dfs.next(&graph) {
            order.push(id);
        }

        Self {
            graph,
            target,
            by_name,
            order,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn target_node(&self) -> &BuildNode {
        &self.graph[self.target]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, id: NodeId) -> &BuildNode {
        &self.graph[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut BuildNode {
        &mut self.graph[id]
    }

    pub fn id_of(&self, module: &str) -> Option<NodeId> {
        self.by_name.get(module).copied()
    }

    pub fn node_by_name(&self, module: &str) -> Option<&BuildNode> {
        self.id_of(module).map(|id| &self.graph[id])
    }

    /// All nodes, dependencies before dependents. The target is last.
    pub fn post_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Module names in build order (dependencies first).
    pub fn build_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&id| self.graph[id].module_name())
            .collect()
    }

    /// Nodes without dependencies.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.graph[id].dependencies().is_empty())
            .collect()
    }

    /// Direct dependents: nodes that list `id` among their dependencies.
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.graph
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BuildNode> {
        self.order.iter().map(|&id| &self.graph[id])
    }
}
