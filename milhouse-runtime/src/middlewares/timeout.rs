// milhouse-runtime/src/middlewares/timeout.rs
// ============================================================================
// Module: Timeout Middleware
// Description: Races the inner chain against a single-shot timer, with an
//              optional progressive backoff on repeated attempts.
// Purpose: Bound how long one engine invocation (or one retry attempt) may
//          run before it is aborted.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! The timeout applied on attempt N is `base * 1.5.pow(N - 1)`, capped at
//! `ceiling`, when the progressive variant is enabled; otherwise `base` is
//! used unconditionally. `context.attempt` (maintained by the retry
//! middleware) drives the scaling.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Configuration for [`TimeoutMiddleware`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    /// Timeout applied on the first attempt, absent a request override.
    pub base: Duration,
    /// Whether the timeout grows by 1.5x per failed attempt.
    pub progressive: bool,
    /// Ceiling the progressive timeout never exceeds.
    pub ceiling: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(66 * 60),
            progressive: false,
            ceiling: Duration::from_secs(2 * 66 * 60),
        }
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Bounds the duration of one attempt of the inner chain.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    /// Configuration.
    policy: TimeoutPolicy,
}

impl TimeoutMiddleware {
    /// Creates a timeout middleware under `policy`.
    #[must_use]
    pub const fn new(policy: TimeoutPolicy) -> Self {
        Self { policy }
    }

    /// Computes the effective timeout for `attempt` (1-based), given a
    /// request-level override if present.
    fn effective_timeout(&self, request_override: Option<u64>, attempt: u32) -> Duration {
        let base = request_override.map_or(self.policy.base, Duration::from_millis);
        if !self.policy.progressive || attempt <= 1 {
            return base;
        }
        let scale = 1.5_f64.powi(i32::try_from(attempt - 1).unwrap_or(i32::MAX));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            reason = "scale is bounded by a small attempt count; truncation only shortens an already-generous timeout"
        )]
        let scaled_millis = (base.as_millis() as f64 * scale) as u64;
        let scaled = Duration::from_millis(scaled_millis);
        scaled.min(self.policy.ceiling)
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        let timeout = self.effective_timeout(request.timeout_ms, context.attempt);
        let task_id = context.metadata.get("task_id").and_then(serde_json::Value::as_str).map(str::to_owned);

        match tokio::time::timeout(timeout, next.call(request, context)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(RuntimeError::Timeout { timeout, task_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TimeoutMiddleware;
    use super::TimeoutPolicy;

    #[test]
    fn progressive_timeout_scales_and_caps() {
        let middleware = TimeoutMiddleware::new(TimeoutPolicy {
            base: Duration::from_secs(10),
            progressive: true,
            ceiling: Duration::from_secs(20),
        });
        assert_eq!(middleware.effective_timeout(None, 1), Duration::from_secs(10));
        assert_eq!(middleware.effective_timeout(None, 2), Duration::from_secs(15));
        assert_eq!(middleware.effective_timeout(None, 10), Duration::from_secs(20));
    }

    #[test]
    fn non_progressive_timeout_never_scales() {
        let middleware = TimeoutMiddleware::new(TimeoutPolicy {
            base: Duration::from_secs(10),
            progressive: false,
            ceiling: Duration::from_secs(20),
        });
        assert_eq!(middleware.effective_timeout(None, 5), Duration::from_secs(10));
    }
}
