// src/engine/mod.rs

//! Build session engine.
//!
//! This module ties together:
//! - the Build Queue (eligible and claimed nodes)
//! - the shared session state behind one lock
//! - the pure reconciliation round
//! - the executor pool and the scheduler loop that drives it
//!
//! The pure state machine lives in [`reconcile`]; the async shell is
//! implemented in [`scheduler`] and [`executor`].

use std::time::Duration;

use crate::dag::InvariantViolation;
use crate::types::ModuleName;

/// Default pause between two reconciliation rounds.
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Knobs for one build session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Number of executors in the pool. Zero is treated as one.
    pub workers: usize,
    /// Pause between rounds when nothing wakes the actors earlier.
    pub tick: Duration,
    /// Appended to the target's own build only.
    pub extra_args: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            tick: DEFAULT_TICK,
            extra_args: String::new(),
        }
    }
}

/// Events flowing from executors and handles into the scheduler loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A build attempt concluded or was aborted.
    NodeSettled,
    /// A module was forced back to `WAITING` from outside.
    Invalidated(ModuleName),
    /// An actor hit an illegal state transition; the session must end.
    Fatal(InvariantViolation),
}

pub mod executor;
pub mod queue;
pub mod reconcile;
pub mod scheduler;
pub mod state;

pub use executor::Executor;
pub use queue::BuildQueue;
pub use reconcile::{ReconcileStep, reconcile};
pub use scheduler::{BuildScheduler, BuildSession, SessionHandle};
pub use state::{BuildReport, BuildState, NodeReport, SharedState};
