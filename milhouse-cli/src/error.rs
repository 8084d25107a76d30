// milhouse-cli/src/error.rs
// ============================================================================
// Module: CLI Error
// Description: The CLI's single error type, carrying the exit code its
//              origin implies.
// Purpose: Let every phase driver and the entry point propagate one error
//          type via `?` while still producing the documented exit codes.
// Dependencies: thiserror, milhouse-config, milhouse-exec, milhouse-runtime
// ============================================================================

//! ## Overview
//! Exit codes are fixed: 0 success, 1 generic failure, 2 no active run, 3
//! engine unavailable, 4 gate failure. [`CliError::code`] classifies the
//! wrapped error kind into one of the first four; exit code 4 is never
//! produced here since it depends on the verify phase's outcome rather than
//! an error, and is decided directly in `main`.

use thiserror::Error;

/// The CLI's single error type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CliError {
    /// Human-readable error message.
    message: String,
    /// Process exit code this error implies.
    code: u8,
}

impl CliError {
    /// Builds a generic-failure (exit code 1) error from a plain message.
    pub fn generic(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: 1 }
    }

    /// Builds a no-active-run (exit code 2) error.
    pub fn no_active_run(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: 2 }
    }

    /// Builds an engine-unavailable (exit code 3) error.
    pub fn engine_unavailable(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: 3 }
    }

    /// Returns the process exit code this error implies.
    #[must_use]
    pub const fn code(&self) -> u8 {
        self.code
    }
}

impl From<milhouse_config::ConfigError> for CliError {
    fn from(source: milhouse_config::ConfigError) -> Self {
        Self::generic(source.to_string())
    }
}

impl From<milhouse_exec::StoreError> for CliError {
    fn from(source: milhouse_exec::StoreError) -> Self {
        match source {
            milhouse_exec::StoreError::NotFound { .. } => Self::no_active_run(source.to_string()),
            other => Self::generic(other.to_string()),
        }
    }
}

impl From<milhouse_exec::ExecError> for CliError {
    fn from(source: milhouse_exec::ExecError) -> Self {
        match source {
            milhouse_exec::ExecError::Store(store_error) => Self::from(store_error),
            milhouse_exec::ExecError::Runtime(runtime_error) => Self::from(runtime_error),
            other => Self::generic(other.to_string()),
        }
    }
}

impl From<milhouse_exec::GateError> for CliError {
    fn from(source: milhouse_exec::GateError) -> Self {
        Self::generic(source.to_string())
    }
}

impl From<milhouse_runtime::RuntimeError> for CliError {
    fn from(source: milhouse_runtime::RuntimeError) -> Self {
        if matches!(source, milhouse_runtime::RuntimeError::Engine(milhouse_engines::EngineError::Unavailable(_))) {
            Self::engine_unavailable(source.to_string())
        } else {
            Self::generic(source.to_string())
        }
    }
}
