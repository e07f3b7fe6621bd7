// src/config/validate.rs

use std::collections::HashSet;

use tracing::debug;

use crate::config::model::{Manifest, ModuleDescriptor, RawManifest};
use crate::errors::{DepbuildError, Result};
use crate::exec::registry::COMMAND_BUILDER;

impl TryFrom<RawManifest> for Manifest {
    type Error = DepbuildError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        let modules = raw.modules.into_iter().map(dedup_dependencies).collect();
        Ok(Manifest::new_unchecked(modules))
    }
}

fn validate_raw_manifest(raw: &RawManifest) -> Result<()> {
    ensure_has_modules(raw)?;
    validate_module_names(raw)?;
    validate_builder_fields(raw)?;
    Ok(())
}

fn ensure_has_modules(raw: &RawManifest) -> Result<()> {
    if raw.modules.is_empty() {
        return Err(DepbuildError::ConfigError(
            "manifest must declare at least one module".to_string(),
        ));
    }
    Ok(())
}

fn validate_module_names(raw: &RawManifest) -> Result<()> {
    let mut seen = HashSet::new();
    for module in &raw.modules {
        if module.name.trim().is_empty() {
            return Err(DepbuildError::ConfigError(
                "module names must not be empty".to_string(),
            ));
        }
        if !seen.insert(module.name.as_str()) {
            return Err(DepbuildError::ConfigError(format!(
                "module '{}' is declared more than once",
                module.name
            )));
        }
    }
    Ok(())
}

fn validate_builder_fields(raw: &RawManifest) -> Result<()> {
    for module in &raw.modules {
        if module.builder.trim().is_empty() {
            return Err(DepbuildError::ConfigError(format!(
                "module '{}' has an empty `builder`",
                module.name
            )));
        }
        match &module.command {
            Some(cmd) if cmd.trim().is_empty() => {
                return Err(DepbuildError::ConfigError(format!(
                    "module '{}' has an empty `command`",
                    module.name
                )));
            }
            None if module.builder == COMMAND_BUILDER => {
                return Err(DepbuildError::ConfigError(format!(
                    "module '{}' uses the `{}` builder but sets no `command`",
                    module.name, COMMAND_BUILDER
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Repeated dependency names carry no meaning; keep the first occurrence.
fn dedup_dependencies(mut module: ModuleDescriptor) -> ModuleDescriptor {
    let before = module.dependencies.len();
    let mut seen = HashSet::new();
    module.dependencies.retain(|d| seen.insert(d.clone()));
    if module.dependencies.len() != before {
        debug!(module = %module.name, "collapsed duplicate dependency entries");
    }
    module
}
