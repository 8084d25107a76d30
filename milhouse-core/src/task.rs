// milhouse-core/src/task.rs
// ============================================================================
// Module: Milhouse Task Entity
// Description: A unit of code change produced by the planner and consolidated
//              into the global task graph.
// Purpose: Define the Task entity, its acceptance criteria, and status
//          vocabulary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Tasks are created by the plan phase, reorganized by consolidate into
//! parallel groups via a topological sort, and thereafter mutated only by the
//! executor (status) and the DoD gate (acceptance verification).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::IssueId;
use crate::ids::TaskId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Execution status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet picked up by a worker.
    Pending,
    /// Currently being executed.
    InProgress,
    /// Executed successfully and (if applicable) merged.
    Done,
    /// Execution failed terminally.
    Failed,
    /// Execution succeeded but the worker branch could not be merged.
    MergeError,
}

// ============================================================================
// SECTION: Acceptance
// ============================================================================

/// One acceptance criterion attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acceptance {
    /// Human-readable description of the criterion.
    pub description: String,
    /// Optional shell command the DoD gate runs to verify the criterion.
    pub check_command: Option<String>,
    /// Whether the DoD gate has verified this criterion.
    pub verified: bool,
}

impl Acceptance {
    /// Creates a new, unverified acceptance criterion.
    #[must_use]
    pub fn new(description: impl Into<String>, check_command: Option<String>) -> Self {
        Self {
            description: description.into(),
            check_command,
            verified: false,
        }
    }
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// A unit of code change produced for one issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Parent issue identifier.
    pub issue_id: IssueId,
    /// Short task title.
    pub title: String,
    /// Longer task description for the executor prompt.
    pub description: String,
    /// Files declared to be touched by this task.
    pub files: Vec<String>,
    /// Task identifiers this task depends on.
    pub depends_on: Vec<TaskId>,
    /// Shell commands the DoD gate may run.
    pub checks: Vec<String>,
    /// Acceptance criteria.
    pub acceptance: Vec<Acceptance>,
    /// Scheduling tie-break bucket; non-negative, lower runs first.
    pub parallel_group: u32,
    /// Current status.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last-update timestamp.
    pub updated_at: Timestamp,
}

impl Task {
    /// Creates a new, pending task.
    #[must_use]
    pub fn new(
        id: TaskId,
        issue_id: IssueId,
        title: impl Into<String>,
        description: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            issue_id,
            title: title.into(),
            description: description.into(),
            files: Vec::new(),
            depends_on: Vec::new(),
            checks: Vec::new(),
            acceptance: Vec::new(),
            parallel_group: 0,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns whether every acceptance criterion with a check command is
    /// verified, or the task has no such criteria.
    #[must_use]
    pub fn all_checked_acceptance_verified(&self) -> bool {
        self.acceptance
            .iter()
            .filter(|item| item.check_command.is_some())
            .all(|item| item.verified)
    }
}
