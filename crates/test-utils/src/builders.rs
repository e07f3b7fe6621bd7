#![allow(dead_code)]

use depbuild::config::{Manifest, ModuleDescriptor, RawManifest};
use depbuild::dag::{BuildGraph, build_graph};
use depbuild::exec::BuilderRegistry;

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest::default(),
        }
    }

    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.manifest.modules.push(module);
        self
    }

    /// Shorthand for a module of builder kind `builder` with the given
    /// dependencies.
    pub fn module(self, name: &str, builder: &str, deps: &[&str]) -> Self {
        let mut m = ModuleBuilder::new(name, builder);
        for d in deps {
            m = m.depends_on(d);
        }
        self.with_module(m.build())
    }

    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }

    /// Validate and resolve the graph for `target` in one go.
    pub fn graph(self, target: &str, registry: &BuilderRegistry) -> BuildGraph {
        build_graph(&self.build(), target, registry).expect("Failed to build graph from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ModuleDescriptor`.
pub struct ModuleBuilder {
    module: ModuleDescriptor,
}

impl ModuleBuilder {
    pub fn new(name: &str, builder: &str) -> Self {
        Self {
            module: ModuleDescriptor::new(name, builder),
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.module.dependencies.push(dep.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.module.command = Some(command.to_string());
        self
    }

    pub fn build(self) -> ModuleDescriptor {
        self.module
    }
}

/// The five-module sample used across the tests:
/// `{D: [], E: [], C: [E], B: [D], A: [B, C, D, E]}`.
pub fn sample_manifest(builder: &str) -> ManifestBuilder {
    ManifestBuilder::new()
        .module("A", builder, &["B", "C", "D", "E"])
        .module("B", builder, &["D"])
        .module("C", builder, &["E"])
        .module("D", builder, &[])
        .module("E", builder, &[])
}
