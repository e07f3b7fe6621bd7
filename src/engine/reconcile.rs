// src/engine/reconcile.rs

//! One reconciliation round over the session state.
//!
//! A round runs, in order:
//! 1. status reconciliation, dependencies before dependents;
//! 2. fast-fail of every waiting node behind a failed dependency;
//! 3. rebuild of the pending queue;
//! 4. the termination check on the target.
//!
//! It is synchronous and side-effect free apart from the state it is handed,
//! so tests can step it by hand.

use tracing::{debug, warn};

use crate::dag::{BuildGraph, BuildStatus, InvariantViolation, NodeId};
use crate::engine::state::BuildState;
use crate::types::{ModuleName, Verdict};

/// What changed during one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStep {
    /// Nodes moved `WAITING -> PENDING`.
    pub promoted: Vec<ModuleName>,
    /// Nodes moved back to `WAITING` because a dependency is no longer
    /// satisfied.
    pub demoted: Vec<ModuleName>,
    /// Nodes failed because a dependency failed.
    pub failed: Vec<ModuleName>,
    /// Set once the target settled in `SUCCESS` or `ERROR`.
    pub verdict: Option<Verdict>,
}

impl ReconcileStep {
    pub fn is_terminal(&self) -> bool {
        self.verdict.is_some()
    }

    /// Whether no status changed in this round.
    pub fn is_quiet(&self) -> bool {
        self.promoted.is_empty() && self.demoted.is_empty() && self.failed.is_empty()
    }
}

/// Run one full round. See the module docs for the ordering.
pub fn reconcile(state: &mut BuildState) -> Result<ReconcileStep, InvariantViolation> {
    let mut step = ReconcileStep::default();

    reconcile_statuses(&mut state.graph, &mut step)?;
    propagate_failures(&mut state.graph, &mut step)?;
    state.queue.rebuild(&state.graph);

    step.verdict = match state.graph.target_node().status() {
        BuildStatus::Success => Some(Verdict::Success),
        BuildStatus::Error => Some(Verdict::Failure),
        _ => None,
    };

    if !step.is_quiet() {
        debug!(
            promoted = ?step.promoted,
            demoted = ?step.demoted,
            failed = ?step.failed,
            pending = state.queue.pending().len(),
            "reconciliation round changed statuses"
        );
    }
    Ok(step)
}

/// Apply the promotion/demotion rule to every node. Post-order guarantees a
/// node sees its dependencies' statuses as of this round, and visits shared
/// nodes once.
fn reconcile_statuses(
    graph: &mut BuildGraph,
    step: &mut ReconcileStep,
) -> Result<(), InvariantViolation> {
    let order: Vec<NodeId> = graph.post_order().to_vec();

    for id in order {
        let deps: Vec<BuildStatus> = graph
            .node(id)
            .dependencies()
            .iter()
            .map(|&d| graph.node(d).status())
            .collect();
        let node = graph.node_mut(id);

        match node.status() {
            BuildStatus::Waiting => {
                if deps.iter().all(|&s| s == BuildStatus::Success) {
                    node.mark_pending()?;
                    step.promoted.push(node.module_name().to_string());
                }
            }
            // A failed node only retries once a dependency is rebuilt; a
            // dependency that is itself in `ERROR` keeps it failed.
            BuildStatus::Error => {
                if deps.iter().any(|s| !s.is_done()) {
                    node.demote()?;
                    step.demoted.push(node.module_name().to_string());
                }
            }
            status @ (BuildStatus::Pending | BuildStatus::Building | BuildStatus::Success) => {
                if deps.iter().any(|&s| s != BuildStatus::Success) {
                    if status == BuildStatus::Building {
                        debug!(module = %node.module_name(), "dependency invalidated mid-build");
                    }
                    node.demote()?;
                    step.demoted.push(node.module_name().to_string());
                }
            }
        }
    }
    Ok(())
}

/// Fail every waiting node that has a failed dependency. Post-order makes
/// this transitive within a single pass.
fn propagate_failures(
    graph: &mut BuildGraph,
    step: &mut ReconcileStep,
) -> Result<(), InvariantViolation> {
    let order: Vec<NodeId> = graph.post_order().to_vec();

    for id in order {
        if graph.node(id).status() != BuildStatus::Waiting {
            continue;
        }
        let failed_dep = graph
            .node(id)
            .dependencies()
            .iter()
            .map(|&d| graph.node(d))
            .find(|d| d.status() == BuildStatus::Error)
            .map(|d| d.module_name().to_string());

        if let Some(dep) = failed_dep {
            let node = graph.node_mut(id);
            node.mark_dependency_failed(&dep)?;
            warn!(module = %node.module_name(), dependency = %dep, "failing module: dependency failed");
            step.failed.push(node.module_name().to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Manifest, ModuleDescriptor, RawManifest};
    use crate::dag::build_graph;
    use crate::exec::BuilderRegistry;
    use crate::types::BuildOutcome;

    /// `{D: [], E: [], C: [E], B: [D], A: [B, C, D, E]}`
    fn state() -> BuildState {
        let specs: &[(&str, &[&str])] = &[
            ("A", &["B", "C", "D", "E"]),
            ("B", &["D"]),
            ("C", &["E"]),
            ("D", &[]),
            ("E", &[]),
        ];
        let modules = specs
            .iter()
            .map(|(name, deps)| {
                let mut m = ModuleDescriptor::new(*name, "noop");
                m.dependencies = deps.iter().map(|d| d.to_string()).collect();
                m
            })
            .collect();
        let manifest = Manifest::try_from(RawManifest { modules }).unwrap();
        BuildState::new(build_graph(&manifest, "A", &BuilderRegistry::with_defaults()).unwrap())
    }

    fn status(state: &BuildState, module: &str) -> BuildStatus {
        state.status_of(module).unwrap()
    }

    /// Claim and finish every pending node with the given outcome picker.
    fn build_pending(state: &mut BuildState, fail: &[&str]) {
        while let Some(id) = state.queue.claim(&mut state.graph).unwrap() {
            let name = state.graph.node(id).module_name().to_string();
            let outcome = if fail.contains(&name.as_str()) {
                BuildOutcome::failure("nope")
            } else {
                BuildOutcome::success("ok")
            };
            state.graph.node_mut(id).complete(outcome).unwrap();
            state.queue.release(id);
        }
    }

    #[test]
    fn first_round_promotes_leaves_only() {
        let mut s = state();
        let step = reconcile(&mut s).unwrap();

        let mut promoted = step.promoted.clone();
        promoted.sort();
        assert_eq!(promoted, vec!["D", "E"]);
        assert_eq!(status(&s, "A"), BuildStatus::Waiting);
        assert_eq!(s.queue.pending().len(), 2);
        assert!(!step.is_terminal());
    }

    #[test]
    fn rounds_converge_to_success() {
        let mut s = state();
        let mut verdict = None;
        for _ in 0..10 {
            let step = reconcile(&mut s).unwrap();
            if step.is_terminal() {
                verdict = step.verdict;
                break;
            }
            build_pending(&mut s, &[]);
        }
        assert_eq!(verdict, Some(Verdict::Success));
        for m in ["A", "B", "C", "D", "E"] {
            assert_eq!(status(&s, m), BuildStatus::Success, "module {m}");
        }
    }

    #[test]
    fn failure_propagates_to_dependents() {
        let mut s = state();
        let mut verdict = None;
        for _ in 0..10 {
            let step = reconcile(&mut s).unwrap();
            if step.is_terminal() {
                verdict = step.verdict;
                break;
            }
            build_pending(&mut s, &["C"]);
        }
        assert_eq!(verdict, Some(Verdict::Failure));
        assert_eq!(status(&s, "C"), BuildStatus::Error);
        assert_eq!(status(&s, "A"), BuildStatus::Error);
        assert_eq!(s.graph.node_by_name("A").unwrap().detail(), Some("dependency C failed"));
        for m in ["B", "D", "E"] {
            assert_eq!(status(&s, m), BuildStatus::Success, "module {m}");
        }
    }

    #[test]
    fn failed_leaf_fails_whole_chain_in_one_round() {
        let mut s = state();
        reconcile(&mut s).unwrap();
        build_pending(&mut s, &["D"]);

        let step = reconcile(&mut s).unwrap();
        let mut failed = step.failed.clone();
        failed.sort();
        assert_eq!(failed, vec!["A", "B"]);
        assert_eq!(step.verdict, Some(Verdict::Failure));
    }

    #[test]
    fn invalidated_dependency_demotes_then_rebuilds_dependents() {
        let mut s = state();
        for _ in 0..10 {
            if reconcile(&mut s).unwrap().is_terminal() {
                break;
            }
            build_pending(&mut s, &[]);
        }
        assert_eq!(status(&s, "A"), BuildStatus::Success);

        assert!(s.invalidate("D").unwrap());
        let step = reconcile(&mut s).unwrap();
        assert_eq!(step.promoted, vec!["D"]);
        let mut demoted = step.demoted.clone();
        demoted.sort();
        assert_eq!(demoted, vec!["A", "B"]);
        assert_eq!(status(&s, "C"), BuildStatus::Success);
        assert!(!step.is_terminal());

        let mut verdict = None;
        for _ in 0..10 {
            build_pending(&mut s, &[]);
            let step = reconcile(&mut s).unwrap();
            if step.is_terminal() {
                verdict = step.verdict;
                break;
            }
        }
        assert_eq!(verdict, Some(Verdict::Success));
        assert_eq!(status(&s, "B"), BuildStatus::Success);
    }

    #[test]
    fn building_node_is_demoted_when_dependency_goes_dirty() {
        let mut s = state();
        reconcile(&mut s).unwrap();
        build_pending(&mut s, &[]);
        reconcile(&mut s).unwrap();

        // B and C are pending now; claim B and leave it building.
        let b = s.graph.id_of("B").unwrap();
        while let Some(id) = s.queue.claim(&mut s.graph).unwrap() {
            if id == b {
                break;
            }
        }
        assert_eq!(status(&s, "B"), BuildStatus::Building);

        s.invalidate("D").unwrap();
        let step = reconcile(&mut s).unwrap();
        assert!(step.demoted.contains(&"B".to_string()));
        assert_eq!(status(&s, "B"), BuildStatus::Waiting);
        // Still claimed until the owning worker releases it.
        assert!(s.queue.is_locked(b));
    }

    #[test]
    fn errored_node_retries_after_its_dependency_is_rebuilt() {
        let mut s = state();
        reconcile(&mut s).unwrap();
        build_pending(&mut s, &["E"]);
        reconcile(&mut s).unwrap();
        assert_eq!(status(&s, "C"), BuildStatus::Error);

        s.invalidate("E").unwrap();
        let step = reconcile(&mut s).unwrap();
        assert!(step.demoted.contains(&"C".to_string()));
        assert!(step.demoted.contains(&"A".to_string()));
        assert_eq!(status(&s, "E"), BuildStatus::Pending);
        assert_eq!(status(&s, "C"), BuildStatus::Waiting);
    }

    #[test]
    fn quiet_round_changes_nothing() {
        let mut s = state();
        reconcile(&mut s).unwrap();
        let step = reconcile(&mut s).unwrap();
        assert!(step.is_quiet());
    }
}
