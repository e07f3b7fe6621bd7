// src/config/model.rs

use serde::Deserialize;

/// Manifest exactly as deserialized from disk, before shape validation.
///
/// JSON form:
///
/// ```json
/// {
///   "modules": [
///     { "name": "core", "builder": "command", "command": "cargo build -p {module}" },
///     { "name": "app", "builder": "noop", "dependencies": ["core"] }
///   ]
/// }
/// ```
///
/// The TOML form uses `[[modules]]` tables with the same keys.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawManifest {
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
}

/// One module entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique module id.
    pub name: String,

    /// Builder kind, resolved through the [`BuilderRegistry`](crate::exec::BuilderRegistry).
    pub builder: String,

    /// Names of the modules this one depends on, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Command template for process-backed builders.
    ///
    /// `{module}` and `{target}` are substituted before running.
    #[serde(default)]
    pub command: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, builder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            builder: builder.into(),
            dependencies: Vec::new(),
            command: None,
        }
    }
}

/// A manifest that passed shape validation.
///
/// Module names are unique and non-empty, and each dependency list is free
/// of duplicates. Reference resolution (unknown modules, cycles) happens
/// later, when a graph is built for a concrete target.
#[derive(Debug, Clone)]
pub struct Manifest {
    modules: Vec<ModuleDescriptor>,
}

impl Manifest {
    /// Construct without validation. Only used by the `TryFrom<RawManifest>`
    /// impl after the checks in `validate.rs` pass.
    pub(crate) fn new_unchecked(modules: Vec<ModuleDescriptor>) -> Self {
        Self { modules }
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
