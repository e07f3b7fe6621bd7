// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::node::InvariantViolation;
use crate::dag::resolve::CyclePath;

#[derive(Error, Debug)]
pub enum DepbuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Module {0} unknown")]
    UnknownModule(String),

    #[error("Module {module} uses unknown builder kind '{kind}'")]
    UnknownBuilder { module: String, kind: String },

    #[error("Circular dependency: {0}")]
    CircularDependency(CyclePath),

    #[error("Invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepbuildError {
    /// Whether this error was raised while loading or resolving the manifest,
    /// i.e. before any scheduling started.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DepbuildError::ConfigError(_)
                | DepbuildError::UnknownModule(_)
                | DepbuildError::UnknownBuilder { .. }
                | DepbuildError::CircularDependency(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DepbuildError>;
