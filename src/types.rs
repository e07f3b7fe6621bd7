use std::fmt;

/// Canonical module name type used throughout the crate.
pub type ModuleName = String;

/// Result of one builder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    /// Captured builder output, kept on the node for diagnostics.
    pub detail: String,
}

impl BuildOutcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// Overall verdict of a build session.
///
/// - `Success`: the target reached `SUCCESS`.
/// - `Failure`: the target reached `ERROR` (directly or through a failed
///   dependency).
/// - `Cancelled`: the session was shut down before the target settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
    Cancelled,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }

    /// Process exit code for this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure | Verdict::Cancelled => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Success => "success",
            Verdict::Failure => "failure",
            Verdict::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
