// src/engine/queue.rs

//! Build Queue: eligible nodes and the nodes currently claimed by workers.

use tracing::debug;

use crate::dag::{BuildGraph, BuildStatus, InvariantViolation, NodeId};

/// Coordination record shared by the scheduler and every executor.
///
/// Not synchronised by itself; it always lives inside
/// [`BuildState`](super::state::BuildState) behind the session lock.
#[derive(Debug, Default, Clone)]
pub struct BuildQueue {
    /// Nodes that were `PENDING` at the last reconciliation, in build order.
    pending: Vec<NodeId>,
    /// Nodes claimed by a worker whose attempt has not concluded yet.
    locked: Vec<NodeId>,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[NodeId] {
        &self.pending
    }

    pub fn locked(&self) -> &[NodeId] {
        &self.locked
    }

    pub fn is_locked(&self, id: NodeId) -> bool {
        self.locked.contains(&id)
    }

    /// Replace the pending set with every `PENDING` node of the graph.
    pub fn rebuild(&mut self, graph: &BuildGraph) {
        self.pending = graph
            .post_order()
            .iter()
            .copied()
            .filter(|&id| graph.node(id).status() == BuildStatus::Pending)
            .collect();
    }

    /// Pick the first pending node that is still `PENDING` and not locked,
    /// lock it and move it to `BUILDING`.
    ///
    /// A node whose dependency was invalidated since the last reconciliation
    /// is skipped until the next round demotes it.
    ///
    /// Returns `Ok(None)` when nothing is eligible.
    pub fn claim(&mut self, graph: &mut BuildGraph) -> Result<Option<NodeId>, InvariantViolation> {
        let Some(pos) = self
            .pending
            .iter()
            .position(|&id| is_claimable(graph, id) && !self.locked.contains(&id))
        else {
            return Ok(None);
        };

        let id = self.pending.remove(pos);
        graph.node_mut(id).mark_building()?;
        self.locked.push(id);
        debug!(module = %graph.node(id).module_name(), "claimed node");
        Ok(Some(id))
    }

    /// Drop the claim on `id`. Returns whether it was held.
    pub fn release(&mut self, id: NodeId) -> bool {
        let before = self.locked.len();
        self.locked.retain(|&l| l != id);
        self.locked.len() != before
    }
}

fn is_claimable(graph: &BuildGraph, id: NodeId) -> bool {
    let node = graph.node(id);
    node.status() == BuildStatus::Pending
        && node
            .dependencies()
            .iter()
            .all(|&d| graph.node(d).status() == BuildStatus::Success)
}
