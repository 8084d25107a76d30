// milhouse-exec/src/error.rs
// ============================================================================
// Module: Execution Errors
// Description: Failure modes for the state store, VCS adapter, and gate
//              engine.
// Purpose: Give each subsystem its own error type while keeping them
//          convertible into one top-level error for callers that cross
//          subsystem boundaries (the worker, the pool).
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Failure modes for [`crate::store::RunStateStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure reading, writing, or locking a state file.
    #[error("state store io error: {0}")]
    Io(String),
    /// A state file's contents failed to (de)serialize.
    #[error("state store serialization error: {0}")]
    Serialization(String),
    /// A lock could not be acquired before the retry ceiling elapsed.
    #[error("lock acquisition timed out for {path}")]
    LockTimeout {
        /// Path the lock guards.
        path: String,
    },
    /// The requested entity does not exist in the store.
    #[error("{entity_type} {entity_id} not found")]
    NotFound {
        /// Kind of entity requested.
        entity_type: &'static str,
        /// Identifier of the entity requested.
        entity_id: String,
    },
}

/// Failure modes for [`crate::vcs::Vcs`] implementations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The git binary could not be spawned.
    #[error("failed to spawn git: {0}")]
    Spawn(String),
    /// Git exited non-zero for a command that is not a recognized conflict.
    #[error("git {command} failed (exit {code}): {stderr}")]
    CommandFailed {
        /// The git subcommand invoked, e.g. `"rebase"`.
        command: String,
        /// The process exit code.
        code: i32,
        /// Captured stderr.
        stderr: String,
    },
    /// A rebase or merge stopped on a conflict.
    #[error("git {command} produced a conflict")]
    Conflict {
        /// The git subcommand that conflicted.
        command: String,
    },
}

/// Failure modes for the gate engine and AI verifier.
#[derive(Debug, Error)]
pub enum GateError {
    /// A gate's supporting I/O (reading a file, running a check command)
    /// failed outright, distinct from the gate finding a real problem.
    #[error("gate {gate} failed to run: {message}")]
    ExecutionFailed {
        /// Name of the gate that could not run.
        gate: &'static str,
        /// Underlying failure description.
        message: String,
    },
    /// The AI verifier's response could not be parsed as the expected JSON
    /// shape.
    #[error("verifier response was not valid JSON: {0}")]
    VerifierResponseInvalid(String),
}

/// Top-level error for the issue-parallel executor, unifying the
/// subsystem-specific error types.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A state-store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A VCS operation failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),
    /// A gate failed to run (not: a gate found a problem).
    #[error(transparent)]
    Gate(#[from] GateError),
    /// The middleware-wrapped executor reported a runtime error.
    #[error(transparent)]
    Runtime(#[from] milhouse_runtime::RuntimeError),
    /// The configuration loaded for this run is invalid.
    #[error(transparent)]
    Config(#[from] milhouse_config::ConfigError),
}
