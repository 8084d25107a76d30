// milhouse-engines/src/error.rs
// ============================================================================
// Module: Milhouse Engine Error
// Description: Error kinds raised by engine plugins and their invocation.
// Purpose: Give every plugin a single, structured error enum matching the
//          EngineError kind set.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `EngineError` covers only plugin-level failures (unavailability, spawn
//! failure, non-zero exit, malformed output, JSON extraction failure).
//! Timeout and retry classification live in `milhouse-runtime`, one layer up.

/// Errors raised by an [`crate::EnginePlugin`] or its invocation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine's CLI binary is not present in `PATH`.
    #[error("engine '{0}' is not available in PATH")]
    Unavailable(String),
    /// The child process could not be spawned.
    #[error("failed to spawn engine '{engine}': {message}")]
    Spawn {
        /// Engine name.
        engine: String,
        /// Underlying OS error text.
        message: String,
    },
    /// The child process exited with a non-zero status.
    #[error("engine '{engine}' exited with status {code}: {stderr}")]
    NonZeroExit {
        /// Engine name.
        engine: String,
        /// Process exit code.
        code: i32,
        /// Captured stderr.
        stderr: String,
    },
    /// The engine's output could not be parsed into a well-formed result.
    #[error("engine '{engine}' produced malformed output: {message}")]
    MalformedOutput {
        /// Engine name.
        engine: String,
        /// Description of the malformation.
        message: String,
    },
    /// A JSON payload (e.g. the AI verifier's response) could not be
    /// extracted from the engine's output.
    #[error("failed to extract JSON payload from engine output: {0}")]
    JsonExtractionFailed(String),
}
