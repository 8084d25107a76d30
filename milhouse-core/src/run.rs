// milhouse-core/src/run.rs
// ============================================================================
// Module: Milhouse Run Entity
// Description: The top-level unit of pipeline work and its lifecycle.
// Purpose: Define the Run entity, its phase state machine, and retention
//          policy.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A run owns every issue, task, execution, and audit entry produced while
//! driving the six pipeline phases over one scope of a repository.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::RunId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Run Phase
// ============================================================================

/// Pipeline phase a run currently occupies.
///
/// # Invariants
/// Transitions are monotonic along `Scan < Validate < Plan < Consolidate <
/// Exec < Verify`, except that `Completed` and `Failed` are reachable from
/// any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Scanning the repository for candidate issues.
    Scan,
    /// Validating scanned issues.
    Validate,
    /// Planning per-issue work breakdown structures.
    Plan,
    /// Consolidating per-issue plans into one task graph.
    Consolidate,
    /// Executing the consolidated task graph.
    Exec,
    /// Running verification gates and the AI verifier.
    Verify,
    /// Terminal success state.
    Completed,
    /// Terminal failure state.
    Failed,
}

impl RunPhase {
    /// Returns the phase's position in the pipeline order, or `None` for the
    /// terminal states, which are reachable from any phase.
    #[must_use]
    pub const fn ordinal(self) -> Option<u8> {
        match self {
            Self::Scan => Some(0),
            Self::Validate => Some(1),
            Self::Plan => Some(2),
            Self::Consolidate => Some(3),
            Self::Exec => Some(4),
            Self::Verify => Some(5),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Returns whether transitioning from `self` to `next` is permitted by
    /// the monotonic phase-order invariant.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) => from <= to,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

// ============================================================================
// SECTION: Cleanup Policy
// ============================================================================

/// Retention policy applied to completed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Never evict runs automatically.
    Manual,
    /// Evict old runs only after a successful completion.
    OnSuccess,
    /// Always evict old runs once the retention quota is exceeded.
    Always,
}

// ============================================================================
// SECTION: Run Stats
// ============================================================================

/// Aggregated counters tracked alongside a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Issues discovered by the scan phase.
    pub issues_found: u32,
    /// Issues whose status left `UNVALIDATED`.
    pub issues_validated: u32,
    /// Total tasks in the consolidated graph.
    pub tasks_total: u32,
    /// Tasks whose status is `done`.
    pub tasks_completed: u32,
    /// Tasks whose status is `failed` or `merge_error`.
    pub tasks_failed: u32,
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// The top-level unit of pipeline work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier.
    pub id: RunId,
    /// Free-text focus area, e.g. "frontend".
    pub scope: Option<String>,
    /// Optional human-assigned run name.
    pub name: Option<String>,
    /// Current pipeline phase.
    pub phase: RunPhase,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last-update timestamp.
    pub updated_at: Timestamp,
    /// Aggregated stats.
    pub stats: RunStats,
}

impl Run {
    /// Creates a new run in the `Scan` phase.
    #[must_use]
    pub fn new(id: RunId, scope: Option<String>, name: Option<String>, now: Timestamp) -> Self {
        Self {
            id,
            scope,
            name,
            phase: RunPhase::Scan,
            created_at: now,
            updated_at: now,
            stats: RunStats::default(),
        }
    }

    /// Attempts to transition the run to `next`, returning `false` (leaving
    /// the run unchanged) when the transition violates the phase-order
    /// invariant.
    #[must_use]
    pub fn transition_to(&mut self, next: RunPhase, now: Timestamp) -> bool {
        if !self.phase.can_transition_to(next) {
            return false;
        }
        self.phase = next;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::Run;
    use super::RunPhase;
    use crate::ids::RunId;
    use crate::time::Timestamp;

    #[test]
    fn phase_transitions_are_monotonic() {
        assert!(RunPhase::Scan.can_transition_to(RunPhase::Validate));
        assert!(!RunPhase::Validate.can_transition_to(RunPhase::Scan));
        assert!(RunPhase::Plan.can_transition_to(RunPhase::Failed));
        assert!(RunPhase::Completed.can_transition_to(RunPhase::Completed));
    }

    #[test]
    fn run_transition_rejects_backwards_move() {
        let now = Timestamp::from_unix_millis(0);
        let mut run = Run::new(RunId::new("run-20260101-000000-abcd"), None, None, now);
        run.phase = RunPhase::Plan;
        assert!(!run.transition_to(RunPhase::Scan, now));
        assert_eq!(run.phase, RunPhase::Plan);
    }
}
