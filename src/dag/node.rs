// src/dag/node.rs

//! Build Node and its guarded status transitions.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dag::graph::NodeId;
use crate::exec::Builder;
use crate::types::{BuildOutcome, ModuleName};

/// Build status of a node within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    /// Dependencies are not all satisfied yet.
    Waiting,
    /// Dependencies succeeded; eligible to be claimed by a worker.
    Pending,
    /// Claimed by a worker; a builder invocation is in flight.
    Building,
    /// Last build finished without error.
    Success,
    /// Last build failed, or a dependency failed.
    Error,
}

impl BuildStatus {
    /// `SUCCESS` or `ERROR`. Both can still be demoted by an invalidation.
    pub fn is_done(self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Error)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Waiting => "WAITING",
            BuildStatus::Pending => "PENDING",
            BuildStatus::Building => "BUILDING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// An illegal status transition. Always a coordination bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("module {module}: cannot {attempted} while {from}")]
pub struct InvariantViolation {
    pub module: ModuleName,
    pub from: BuildStatus,
    pub attempted: &'static str,
}

/// Per-session record for one module.
///
/// The dependency list and builder are fixed at graph construction; only
/// `status` and `detail` change afterwards, and only through the `mark_*`
/// and `demote` methods below.
pub struct BuildNode {
    module_name: ModuleName,
    target_module_name: ModuleName,
    builder: Arc<dyn Builder>,
    dependencies: Vec<NodeId>,
    status: BuildStatus,
    detail: Option<String>,
}

impl fmt::Debug for BuildNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildNode")
            .field("module_name", &self.module_name)
            .field("target_module_name", &self.target_module_name)
            .field("dependencies", &self.dependencies)
            .field("status", &self.status)
            .field("detail", &self.detail)
            .finish_non_exhaustive()
    }
}

impl BuildNode {
    pub(crate) fn new(
        module_name: ModuleName,
        target_module_name: ModuleName,
        builder: Arc<dyn Builder>,
        dependencies: Vec<NodeId>,
    ) -> Self {
        Self {
            module_name,
            target_module_name,
            builder,
            dependencies,
            status: BuildStatus::Waiting,
            detail: None,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn target_module_name(&self) -> &str {
        &self.target_module_name
    }

    pub fn is_target(&self) -> bool {
        self.module_name == self.target_module_name
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Shared handle on this node's builder, so a worker can drive it
    /// outside the session lock.
    pub fn builder(&self) -> Arc<dyn Builder> {
        Arc::clone(&self.builder)
    }

    fn guard(&self, expected: BuildStatus, attempted: &'static str) -> Result<(), InvariantViolation> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.violation(attempted))
        }
    }

    fn violation(&self, attempted: &'static str) -> InvariantViolation {
        InvariantViolation {
            module: self.module_name.clone(),
            from: self.status,
            attempted,
        }
    }

    /// `WAITING -> PENDING`, once every dependency succeeded.
    pub fn mark_pending(&mut self) -> Result<(), InvariantViolation> {
        self.guard(BuildStatus::Waiting, "mark pending")?;
        self.status = BuildStatus::Pending;
        Ok(())
    }

    /// `PENDING -> BUILDING`, on a worker's claim.
    pub fn mark_building(&mut self) -> Result<(), InvariantViolation> {
        self.guard(BuildStatus::Pending, "mark building")?;
        self.status = BuildStatus::Building;
        Ok(())
    }

    /// `BUILDING -> SUCCESS`.
    pub fn mark_success(&mut self, detail: String) -> Result<(), InvariantViolation> {
        self.guard(BuildStatus::Building, "mark success")?;
        self.status = BuildStatus::Success;
        self.detail = Some(detail);
        Ok(())
    }

    /// `BUILDING -> ERROR`.
    pub fn mark_error(&mut self, detail: String) -> Result<(), InvariantViolation> {
        self.guard(BuildStatus::Building, "mark error")?;
        self.status = BuildStatus::Error;
        self.detail = Some(detail);
        Ok(())
    }

    /// Apply a builder outcome to a `BUILDING` node.
    pub fn complete(&mut self, outcome: BuildOutcome) -> Result<(), InvariantViolation> {
        if outcome.success {
            self.mark_success(outcome.detail)
        } else {
            self.mark_error(outcome.detail)
        }
    }

    /// `WAITING -> ERROR` without a build attempt, because `dependency`
    /// failed and this node can never become eligible.
    pub fn mark_dependency_failed(&mut self, dependency: &str) -> Result<(), InvariantViolation> {
        self.guard(BuildStatus::Waiting, "fail from dependency")?;
        self.status = BuildStatus::Error;
        self.detail = Some(format!("dependency {dependency} failed"));
        Ok(())
    }

    /// Any non-`WAITING` status `-> WAITING`.
    ///
    /// Drops the previous result. From `BUILDING` this is the abort signal
    /// the owning worker watches for.
    pub fn demote(&mut self) -> Result<(), InvariantViolation> {
        if self.status == BuildStatus::Waiting {
            return Err(self.violation("demote"));
        }
        self.status = BuildStatus::Waiting;
        self.detail = None;
        Ok(())
    }
}
