// src/exec/registry.rs

//! Builder kinds selectable from the manifest's `builder` field.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ModuleDescriptor;
use crate::errors::{DepbuildError, Result};
use crate::exec::builder::Builder;
use crate::exec::command::CommandBuilder;
use crate::exec::noop::NoopBuilder;

pub const NOOP_BUILDER: &str = "noop";
pub const COMMAND_BUILDER: &str = "command";
pub const NG_LIB_BUILDER: &str = "ng-lib";

/// Template used by `ng-lib` modules that do not set their own `command`.
pub const NG_LIB_TEMPLATE: &str = "ng build {module}";

type BuilderFactory = Arc<dyn Fn(&ModuleDescriptor) -> Result<Arc<dyn Builder>> + Send + Sync>;

/// Maps builder kind names to factories.
///
/// A factory is called once per Build Node, so every node gets its own
/// builder instance.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    factories: BTreeMap<String, BuilderFactory>,
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BuilderRegistry {
    /// Empty registry. Mostly useful for tests that register fakes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `noop`, `command` and `ng-lib` kinds.
    pub fn with_defaults() -> Self {
        Self::with_noop_delay(Duration::from_millis(100))
    }

    /// Built-in kinds, with a custom per-character delay for `noop`.
    pub fn with_noop_delay(per_char_delay: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(NOOP_BUILDER, move |_| {
            Ok(Arc::new(NoopBuilder::new(per_char_delay)) as Arc<dyn Builder>)
        });
        registry.register(COMMAND_BUILDER, |module| {
            let template = module.command.clone().ok_or_else(|| {
                DepbuildError::ConfigError(format!(
                    "module '{}' uses the `{}` builder but sets no `command`",
                    module.name, COMMAND_BUILDER
                ))
            })?;
            Ok(Arc::new(CommandBuilder::new(template)) as Arc<dyn Builder>)
        });
        registry.register(NG_LIB_BUILDER, |module| {
            let template = module
                .command
                .clone()
                .unwrap_or_else(|| NG_LIB_TEMPLATE.to_string());
            Ok(Arc::new(CommandBuilder::new(template)) as Arc<dyn Builder>)
        });
        registry
    }

    /// Register (or replace) a builder kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ModuleDescriptor) -> Result<Arc<dyn Builder>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|k| k.as_str())
    }

    /// Create a fresh builder for `module`.
    pub fn create(&self, module: &ModuleDescriptor) -> Result<Arc<dyn Builder>> {
        let factory = self
            .factories
            .get(&module.builder)
            .ok_or_else(|| DepbuildError::UnknownBuilder {
                module: module.name.clone(),
                kind: module.builder.clone(),
            })?;
        factory(module)
    }
}
