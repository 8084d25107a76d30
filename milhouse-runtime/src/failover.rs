// milhouse-runtime/src/failover.rs
// ============================================================================
// Module: Engine Failover
// Description: Tries an ordered list of engine executors in turn.
// Purpose: Implement the documented fallback helper for degraded
//          availability.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! [`try_in_order`] probes each executor's availability before attempting
//! it, and advances to the next candidate on unavailability or a
//! non-retryable failure rather than giving up immediately.

use tracing::warn;

use crate::error::RuntimeError;
use crate::executor::MiddlewareExecutor;
use crate::middleware::ExecutionOutcome;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

/// Tries `executors` in order, returning the first successful outcome.
///
/// # Errors
///
/// Returns the last encountered [`RuntimeError`] if every candidate is
/// unavailable or fails terminally; returns
/// [`RuntimeError::Engine(EngineError::Unavailable)`](milhouse_engines::EngineError::Unavailable)
/// if `executors` is empty.
pub async fn try_in_order(
    executors: &[MiddlewareExecutor],
    request: &ExecutionRequest,
    context: &mut ExecutionContext,
) -> Result<ExecutionOutcome, RuntimeError> {
    let mut last_error = None;

    for executor in executors {
        if !executor.is_available() {
            warn!(engine = executor.engine_name(), "engine unavailable, trying next candidate");
            continue;
        }

        match executor.execute(request, context).await {
            Ok(outcome) => return Ok(outcome),
            Err(error) if error.is_retryable() => {
                warn!(engine = executor.engine_name(), error = %error, "engine failed, trying next candidate");
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        RuntimeError::Engine(milhouse_engines::EngineError::Unavailable("no candidate engines configured".to_owned()))
    }))
}
