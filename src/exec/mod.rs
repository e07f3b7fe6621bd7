// src/exec/mod.rs

//! Builder capabilities.
//!
//! This module defines what an executor calls to actually build a module,
//! and the concrete builders selectable from the manifest.
//!
//! - [`builder`] provides the `Builder` trait and `BuildRequest`.
//! - [`registry`] maps manifest `builder` kinds to builder factories.
//! - [`noop`] is a timer-only builder for dry experiments.
//! - [`command`] runs a shell command through `tokio::process::Command`.

pub mod builder;
pub mod command;
pub mod noop;
pub mod registry;

pub use builder::{BoxFuture, BuildRequest, Builder};
pub use command::CommandBuilder;
pub use noop::NoopBuilder;
pub use registry::BuilderRegistry;
