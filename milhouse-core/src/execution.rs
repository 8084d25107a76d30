// milhouse-core/src/execution.rs
// ============================================================================
// Module: Milhouse Execution Entity
// Description: A record of one engine invocation for one task.
// Purpose: Capture timing, token usage, and outcome of a single attempt.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Executions are append-only: every attempt at a task produces a new
//! record. The latest successful execution carrying a branch name is the
//! one the diff-hygiene gate and the merge phase reason about.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::ExecutionId;
use crate::ids::TaskId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Execution
// ============================================================================

/// A record of one engine invocation attempting one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier.
    pub id: ExecutionId,
    /// Task this execution attempted.
    pub task_id: TaskId,
    /// Worker branch name; empty for in-place execution modes.
    pub branch: String,
    /// Invocation start time.
    pub started_at: Timestamp,
    /// Invocation end time, once known.
    pub ended_at: Option<Timestamp>,
    /// Whether the engine invocation succeeded.
    pub success: bool,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
    /// Error text, when `success` is `false`.
    pub error: Option<String>,
    /// Commit produced by this execution, if any changes were committed.
    pub commit_sha: Option<String>,
}

impl Execution {
    /// Creates a new, in-flight execution record.
    #[must_use]
    pub fn started(id: ExecutionId, task_id: TaskId, branch: String, started_at: Timestamp) -> Self {
        Self {
            id,
            task_id,
            branch,
            started_at,
            ended_at: None,
            success: false,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
            commit_sha: None,
        }
    }

    /// Marks the execution as finished successfully.
    pub fn finish_success(
        &mut self,
        ended_at: Timestamp,
        input_tokens: u64,
        output_tokens: u64,
        commit_sha: Option<String>,
    ) {
        self.ended_at = Some(ended_at);
        self.success = true;
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.commit_sha = commit_sha;
    }

    /// Marks the execution as finished with a terminal error.
    pub fn finish_failure(&mut self, ended_at: Timestamp, error: impl Into<String>) {
        self.ended_at = Some(ended_at);
        self.success = false;
        self.error = Some(error.into());
    }
}
