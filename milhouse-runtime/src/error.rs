// milhouse-runtime/src/error.rs
// ============================================================================
// Module: Runtime Error
// Description: Errors raised by the middleware stack and innermost executor.
// Purpose: Distinguish timeout, circuit-open, and engine-level failures so
//          upstream callers (retry, the issue worker) can classify them.
// Dependencies: thiserror, milhouse-engines
// ============================================================================

//! ## Overview
//! `RuntimeError` wraps [`milhouse_engines::EngineError`] with the
//! middleware-layer failure modes: timeouts, an open circuit breaker, and
//! rate-limit rejection. [`RuntimeError::is_retryable`] implements the
//! message-based transient-failure classification used by the retry
//! middleware.

use std::time::Duration;

use milhouse_engines::EngineError;

/// Substrings that mark an error as non-retryable regardless of its kind.
const NON_RETRYABLE_MARKERS: &[&str] = &[
    "validation",
    "unauthorized",
    "forbidden",
    "not found",
    "invalid",
    "permission denied",
    "authentication",
    "api key",
];

/// Errors raised while executing a request through the middleware stack.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The operation did not complete within its timeout.
    #[error("engine invocation timed out after {timeout:?}")]
    Timeout {
        /// Timeout that elapsed.
        timeout: Duration,
        /// Task id, if the invocation was task-scoped.
        task_id: Option<String>,
    },
    /// The circuit breaker is open and is rejecting calls.
    #[error("circuit breaker open; retry after {reset_in:?}")]
    CircuitOpen {
        /// Remaining time before the breaker transitions to half-open.
        reset_in: Duration,
    },
    /// The rate limiter rejected this call under a `block`-incompatible
    /// overflow policy.
    #[error("rate limit exceeded")]
    RateLimited,
    /// All retry attempts were exhausted.
    #[error("exhausted {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying error.
        #[source]
        source: Box<RuntimeError>,
    },
    /// The innermost engine invocation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RuntimeError {
    /// Returns whether this error should be retried, per the message-based
    /// transient-failure classification.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        if matches!(self, Self::CircuitOpen { .. }) {
            return false;
        }
        let message = self.to_string().to_ascii_lowercase();
        !NON_RETRYABLE_MARKERS.iter().any(|marker| message.contains(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeError;
    use milhouse_engines::EngineError;

    #[test]
    fn unauthorized_engine_error_is_not_retryable() {
        let err = RuntimeError::Engine(EngineError::NonZeroExit {
            engine: "claude".to_owned(),
            code: 1,
            stderr: "Error: unauthorized".to_owned(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn generic_spawn_failure_is_retryable() {
        let err = RuntimeError::Engine(EngineError::Spawn {
            engine: "claude".to_owned(),
            message: "connection reset".to_owned(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn circuit_open_is_never_retryable() {
        let err = RuntimeError::CircuitOpen { reset_in: std::time::Duration::from_secs(5) };
        assert!(!err.is_retryable());
    }
}
