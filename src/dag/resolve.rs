// src/dag/resolve.rs

//! Graph Builder: validates a manifest for one target and instantiates the
//! shared-node [`BuildGraph`].
//!
//! Validation walks the manifest depth-first from the target, carrying the
//! names on the current path. Reaching an unknown name fails with
//! `UnknownModule`; reaching a name already on the path fails with
//! `CircularDependency`, reporting the path segment from that ancestor back
//! to itself. No node is created until the whole reachable graph is clean.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::DiGraph;
use tracing::{debug, info};

use crate::config::{Manifest, ModuleDescriptor};
use crate::dag::graph::{BuildGraph, NodeId};
use crate::dag::node::BuildNode;
use crate::errors::{DepbuildError, Result};
use crate::exec::BuilderRegistry;

/// Module names forming a dependency cycle, first and last entries equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(Vec<String>);

impl CyclePath {
    pub fn modules(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

/// Validate `manifest` for `target` and build its graph.
///
/// Fails with `UnknownModule`, `UnknownBuilder` or `CircularDependency`
/// before any node (or builder) is instantiated.
pub fn build_graph(
    manifest: &Manifest,
    target: &str,
    registry: &BuilderRegistry,
) -> Result<BuildGraph> {
    check_dependencies(manifest, target, registry)?;

    let mut arena = Arena {
        manifest,
        registry,
        target,
        graph: DiGraph::new(),
        known: HashMap::new(),
    };
    let root = arena.instantiate(target)?;
    let graph = BuildGraph::from_arena(arena.graph, root);

    info!(
        target_module = %target,
        nodes = graph.len(),
        "build graph ready"
    );
    Ok(graph)
}

/// Reference and cycle checks for everything reachable from `target`.
pub fn check_dependencies(
    manifest: &Manifest,
    target: &str,
    registry: &BuilderRegistry,
) -> Result<()> {
    let root = manifest
        .module(target)
        .ok_or_else(|| DepbuildError::UnknownModule(target.to_string()))?;

    let mut checker = Checker {
        manifest,
        registry,
        path: Vec::new(),
        clean: HashSet::new(),
    };
    checker.visit(root)
}

struct Checker<'a> {
    manifest: &'a Manifest,
    registry: &'a BuilderRegistry,
    /// Ancestors of the module being visited.
    path: Vec<&'a str>,
    /// Modules whose whole sub-graph already checked out.
    clean: HashSet<&'a str>,
}

impl<'a> Checker<'a> {
    fn visit(&mut self, module: &'a ModuleDescriptor) -> Result<()> {
        let name = module.name.as_str();

        if let Some(pos) = self.path.iter().position(|&p| p == name) {
            let mut cycle: Vec<String> = self.path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Err(DepbuildError::CircularDependency(CyclePath(cycle)));
        }
        if self.clean.contains(name) {
            return Ok(());
        }

        if !self.registry.has_kind(&module.builder) {
            return Err(DepbuildError::UnknownBuilder {
                module: module.name.clone(),
                kind: module.builder.clone(),
            });
        }

        self.path.push(name);
        for dep_name in &module.dependencies {
            let dep = self
                .manifest
                .module(dep_name)
                .ok_or_else(|| DepbuildError::UnknownModule(dep_name.clone()))?;
            self.visit(dep)?;
        }
        self.path.pop();

        self.clean.insert(name);
        Ok(())
    }
}

/// Depth-first node instantiation with memoization by module name.
struct Arena<'a> {
    manifest: &'a Manifest,
    registry: &'a BuilderRegistry,
    target: &'a str,
    graph: DiGraph<BuildNode, ()>,
    known: HashMap<String, NodeId>,
}

impl Arena<'_> {
    fn instantiate(&mut self, name: &str) -> Result<NodeId> {
        if let Some(&id) = self.known.get(name) {
            return Ok(id);
        }

        let module = self
            .manifest
            .module(name)
            .ok_or_else(|| DepbuildError::UnknownModule(name.to_string()))?;

        let mut deps = Vec::with_capacity(module.dependencies.len());
        for dep_name in &module.dependencies {
            deps.push(self.instantiate(dep_name)?);
        }

        let builder = self.registry.create(module)?;
        let node = BuildNode::new(
            module.name.clone(),
            self.target.to_string(),
            builder,
            deps.clone(),
        );
        let id = self.graph.add_node(node);
        for dep in deps {
            self.graph.add_edge(id, dep, ());
        }
        self.known.insert(module.name.clone(), id);

        debug!(module = %module.name, builder = %module.builder, "created build node");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawManifest;

    fn manifest(modules: &[(&str, &[&str])]) -> Manifest {
        let modules = modules
            .iter()
            .map(|(name, deps)| {
                let mut m = ModuleDescriptor::new(*name, "noop");
                m.dependencies = deps.iter().map(|d| d.to_string()).collect();
                m
            })
            .collect();
        Manifest::try_from(RawManifest { modules }).unwrap()
    }

    fn cycle_of(result: Result<BuildGraph>) -> String {
        match result {
            Err(DepbuildError::CircularDependency(path)) => path.to_string(),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let m = manifest(&[("A", &["A", "B"]), ("B", &[])]);
        let reg = BuilderRegistry::with_defaults();
        assert_eq!(cycle_of(build_graph(&m, "A", &reg)), "A -> A");
    }

    #[test]
    fn cycle_path_starts_at_repeated_ancestor() {
        let m = manifest(&[
            ("A", &["B", "D"]),
            ("B", &["C"]),
            ("C", &["E"]),
            ("D", &[]),
            ("E", &["D", "B"]),
        ]);
        let reg = BuilderRegistry::with_defaults();
        assert_eq!(cycle_of(build_graph(&m, "A", &reg)), "B -> C -> E -> B");
    }

    #[test]
    fn unknown_dependency_is_named() {
        let m = manifest(&[("A", &["B"]), ("B", &["U"])]);
        let reg = BuilderRegistry::with_defaults();
        let err = build_graph(&m, "A", &reg).unwrap_err();
        assert!(matches!(err, DepbuildError::UnknownModule(name) if name == "U"));
    }

    #[test]
    fn unknown_target_is_named() {
        let m = manifest(&[("A", &["B"]), ("B", &[])]);
        let reg = BuilderRegistry::with_defaults();
        let err = build_graph(&m, "Y", &reg).unwrap_err();
        assert!(matches!(err, DepbuildError::UnknownModule(name) if name == "Y"));
    }

    #[test]
    fn unknown_builder_kind_is_a_configuration_error() {
        let mut raw = RawManifest::default();
        raw.modules.push(ModuleDescriptor::new("A", "gradle"));
        let m = Manifest::try_from(raw).unwrap();
        let err = build_graph(&m, "A", &BuilderRegistry::with_defaults()).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(matches!(err, DepbuildError::UnknownBuilder { kind, .. } if kind == "gradle"));
    }

    #[test]
    fn unrelated_cycles_are_ignored() {
        let m = manifest(&[("A", &["B"]), ("B", &[]), ("X", &["Y"]), ("Y", &["X"])]);
        let reg = BuilderRegistry::with_defaults();
        assert!(build_graph(&m, "A", &reg).is_ok());
    }

    #[test]
    fn graph_holds_only_the_target_closure() {
        let m = manifest(&[
            ("A", &["B", "D"]),
            ("B", &["C"]),
            ("C", &["D", "E"]),
            ("D", &[]),
            ("E", &["D"]),
            ("F", &["A", "B", "E"]),
        ]);
        let graph = build_graph(&m, "A", &BuilderRegistry::with_defaults()).unwrap();

        let mut names = graph.build_order();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(graph.target_node().module_name(), "A");
        assert!(graph.node_by_name("F").is_none());
    }

    #[test]
    fn shared_dependency_is_one_node() {
        let m = manifest(&[
            ("A", &["B", "C", "D", "E"]),
            ("B", &["D"]),
            ("C", &["E"]),
            ("D", &[]),
            ("E", &[]),
        ]);
        let graph = build_graph(&m, "A", &BuilderRegistry::with_defaults()).unwrap();

        let d = graph.id_of("D").unwrap();
        let a = graph.node_by_name("A").unwrap();
        let b = graph.node_by_name("B").unwrap();
        assert_eq!(a.dependencies()[2], d);
        assert_eq!(b.dependencies()[0], d);

        let mut dependents = graph.dependents_of(d);
        dependents.sort();
        let mut expected = vec![graph.id_of("A").unwrap(), graph.id_of("B").unwrap()];
        expected.sort();
        assert_eq!(dependents, expected);
    }

    #[test]
    fn post_order_puts_dependencies_first() {
        let m = manifest(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        let graph = build_graph(&m, "A", &BuilderRegistry::with_defaults()).unwrap();
        assert_eq!(graph.build_order(), vec!["C", "B", "A"]);
        assert_eq!(graph.leaves(), vec![graph.id_of("C").unwrap()]);
    }

    #[test]
    fn every_node_knows_the_session_target() {
        let m = manifest(&[("A", &["B"]), ("B", &[])]);
        let graph = build_graph(&m, "A", &BuilderRegistry::with_defaults()).unwrap();
        assert!(graph.nodes().all(|n| n.target_module_name() == "A"));
    }
}
