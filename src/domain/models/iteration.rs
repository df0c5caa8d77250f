//! Convergence run state and terminal outcomes.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::violation::ViolationRecord;

/// Outer-loop bookkeeping, owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationState {
    /// Zero-based index of the current outer iteration.
    pub index: u32,
    pub max_iterations: u32,
    pub converged: bool,
}

impl IterationState {
    pub const fn new(max_iterations: u32) -> Self {
        Self {
            index: 0,
            max_iterations,
            converged: false,
        }
    }

    /// One-based iteration number for logs and file names.
    pub const fn number(&self) -> u32 {
        self.index + 1
    }

    pub const fn has_budget(&self) -> bool {
        !self.converged && self.index < self.max_iterations
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    pub fn mark_converged(&mut self) {
        self.converged = true;
    }
}

/// How a convergence run ended, when it ended without an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A build produced zero violations.
    Converged { iterations: u32 },
    /// The iteration budget ran out with violations still present.
    MaxIterationsReached { remaining: Vec<ViolationRecord> },
    /// The source did not compile at the start of an outer iteration.
    CompileFailed { diagnostics: String },
    /// Compile-recovery rounds ran out before the fix compiled.
    RecoveryExhausted {
        iteration: u32,
        attempts: u32,
        diagnostics: String,
    },
    /// Cancellation was requested at an iteration boundary.
    Cancelled { iterations_completed: u32 },
}

impl RunOutcome {
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// Short label used in logs and the summary table.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Converged { .. } => "converged",
            Self::MaxIterationsReached { .. } => "max_iterations_reached",
            Self::CompileFailed { .. } => "compile_failed",
            Self::RecoveryExhausted { .. } => "recovery_exhausted",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// A write-once snapshot of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub iteration: u32,
    pub timestamp: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_budget() {
        let mut state = IterationState::new(2);
        assert!(state.has_budget());
        assert_eq!(state.number(), 1);
        state.advance();
        assert!(state.has_budget());
        state.advance();
        assert!(!state.has_budget());
    }

    #[test]
    fn converged_state_has_no_budget() {
        let mut state = IterationState::new(5);
        state.mark_converged();
        assert!(!state.has_budget());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = RunOutcome::Converged { iterations: 2 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "converged");
        assert_eq!(json["iterations"], 2);
    }
}
