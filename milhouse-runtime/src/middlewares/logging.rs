// milhouse-runtime/src/middlewares/logging.rs
// ============================================================================
// Module: Logging Middleware
// Description: Emits start/complete/error events with context fields.
// Purpose: Outermost observability layer around every engine invocation.
// Dependencies: async-trait, tracing
// ============================================================================

//! ## Overview
//! Logs `engine:start` before delegating, then `engine:complete` or
//! `engine:error` with the elapsed duration once the inner chain returns.

use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::middleware::millis_saturating;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

/// Emits structured start/complete/error log events around the inner chain.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Creates a new logging middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        info!(
            run_id = %context.run_id,
            agent_role = %context.agent_role,
            phase = %context.pipeline_phase,
            work_dir = %request.work_dir.display(),
            "engine:start"
        );

        let result = next.call(request, context).await;

        match &result {
            Ok(outcome) => {
                info!(
                    run_id = %context.run_id,
                    agent_role = %context.agent_role,
                    phase = %context.pipeline_phase,
                    duration_ms = millis_saturating(outcome.duration),
                    success = outcome.success,
                    "engine:complete"
                );
            }
            Err(error) => {
                warn!(
                    run_id = %context.run_id,
                    agent_role = %context.agent_role,
                    phase = %context.pipeline_phase,
                    elapsed_ms = millis_saturating(context.elapsed()),
                    error = %error,
                    "engine:error"
                );
            }
        }

        result
    }
}
