// src/engine/state.rs

//! Session state shared between the scheduler, the executors and any
//! [`SessionHandle`](super::SessionHandle).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::dag::{BuildGraph, BuildStatus};
use crate::engine::queue::BuildQueue;
use crate::errors::{DepbuildError, Result};
use crate::types::{ModuleName, Verdict};

/// Node statuses plus the Build Queue. Every mutation goes through one lock.
#[derive(Debug)]
pub struct BuildState {
    pub graph: BuildGraph,
    pub queue: BuildQueue,
}

impl BuildState {
    pub fn new(graph: BuildGraph) -> Self {
        Self {
            graph,
            queue: BuildQueue::new(),
        }
    }

    pub fn status_of(&self, module: &str) -> Option<BuildStatus> {
        self.graph.node_by_name(module).map(|n| n.status())
    }

    /// Force `module` back to `WAITING`, e.g. because its sources changed.
    ///
    /// Dependents are demoted by the next reconciliation. Returns `false`
    /// when the node was already waiting.
    pub fn invalidate(&mut self, module: &str) -> Result<bool> {
        let id = self
            .graph
            .id_of(module)
            .ok_or_else(|| DepbuildError::UnknownModule(module.to_string()))?;

        let node = self.graph.node_mut(id);
        if node.status() == BuildStatus::Waiting {
            return Ok(false);
        }
        let from = node.status();
        node.demote()?;
        info!(module = %module, %from, "module invalidated");
        Ok(true)
    }

    /// Current status of every node, dependencies first.
    pub fn node_reports(&self) -> Vec<NodeReport> {
        self.graph
            .nodes()
            .map(|n| NodeReport {
                module: n.module_name().to_string(),
                status: n.status(),
                detail: n.detail().map(str::to_string),
            })
            .collect()
    }

    pub fn report(&self, verdict: Verdict) -> BuildReport {
        BuildReport {
            target: self.graph.target_node().module_name().to_string(),
            verdict,
            nodes: self.node_reports(),
        }
    }
}

/// Cloneable handle on the locked [`BuildState`].
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<BuildState>>,
}

impl SharedState {
    pub fn new(graph: BuildGraph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BuildState::new(graph))),
        }
    }

    /// Enter the session's critical section. Never hold the guard across an
    /// `.await`.
    pub fn lock(&self) -> MutexGuard<'_, BuildState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Final status of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub module: ModuleName,
    pub status: BuildStatus,
    pub detail: Option<String>,
}

/// Outcome of a whole session. Nodes are listed dependencies first.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub target: ModuleName,
    pub verdict: Verdict,
    pub nodes: Vec<NodeReport>,
}

impl BuildReport {
    pub fn status_of(&self, module: &str) -> Option<BuildStatus> {
        self.nodes
            .iter()
            .find(|n| n.module == module)
            .map(|n| n.status)
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| n.status == BuildStatus::Error)
    }
}
