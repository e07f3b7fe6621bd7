// src/exec/builder.rs

//! Builder capability abstraction.
//!
//! Executors talk to a `Builder` instead of spawning processes themselves.
//! Each Build Node owns one builder instance for the whole session, so a
//! builder only ever has a single build in flight. Tests can register their
//! own implementations in the [`BuilderRegistry`](super::BuilderRegistry).

use std::future::Future;
use std::pin::Pin;

use crate::types::BuildOutcome;

/// Boxed future returned by [`Builder`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Arguments of one builder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub module_name: String,
    /// Root module of the session.
    pub target_module_name: String,
    /// Free-form extra arguments. Only non-empty for the target's own build.
    pub extra_args: String,
}

impl BuildRequest {
    pub fn is_target(&self) -> bool {
        self.module_name == self.target_module_name
    }
}

/// Capability that builds one module and can be stopped mid-flight.
pub trait Builder: Send + Sync {
    /// Build the module. Failures are reported through
    /// [`BuildOutcome::success`], never as a panic or error.
    fn build(&self, request: BuildRequest) -> BoxFuture<'_, BuildOutcome>;

    /// Stop the in-flight build, if any, and resolve once it is gone.
    ///
    /// Must be idempotent and safe to call with no build running.
    fn stop(&self) -> BoxFuture<'_, ()>;
}
