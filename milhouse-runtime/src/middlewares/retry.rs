// milhouse-runtime/src/middlewares/retry.rs
// ============================================================================
// Module: Retry Middleware
// Description: Retries transient failures with exponential backoff and
//              jitter.
// Purpose: Shield the rest of the pipeline from one-off subprocess flakes
//          without retrying genuinely non-retryable failures.
// Dependencies: async-trait, rand, tokio
// ============================================================================

//! ## Overview
//! Base delay 1s, multiplier 2, ceiling 30s, ±25% jitter. An error is
//! retried unless [`RuntimeError::is_retryable`] says otherwise. This is the
//! one middleware permitted to invoke the remainder of the chain more than
//! once per request — see [`crate::middleware::Next::remaining`].

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Configuration for [`RetryMiddleware`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Delay ceiling.
    pub ceiling: Duration,
    /// Jitter fraction applied symmetrically around the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            ceiling: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Retries the remainder of the chain on retryable failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryMiddleware {
    /// Configuration.
    policy: RetryPolicy,
}

impl RetryMiddleware {
    /// Creates a retry middleware under `policy`.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Computes the delay before attempt `attempt` (the attempt *about to be
    /// retried*, so `attempt` is the number of the failed attempt), with
    /// jitter applied.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.policy.base_delay.as_secs_f64() * self.policy.multiplier.powi(exponent);
        let capped = raw.min(self.policy.ceiling.as_secs_f64());
        let jitter_span = capped * self.policy.jitter;
        let offset = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((capped + offset).max(0.0))
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        let max_retries = request.max_retries.unwrap_or(self.policy.max_retries);
        let (chain, handler) = next.remaining();

        let mut last_error = None;
        for attempt in 1..=max_retries.max(1) {
            context.attempt = attempt;
            let attempt_next = Next::new(chain, handler);
            match attempt_next.call(request, context).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) if !error.is_retryable() || attempt == max_retries.max(1) => {
                    last_error = Some(error);
                    break;
                }
                Err(error) => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    last_error = Some(error);
                }
            }
        }

        Err(RuntimeError::RetriesExhausted {
            attempts: max_retries.max(1),
            source: Box::new(last_error.unwrap_or(RuntimeError::RateLimited)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::RetryMiddleware;
    use super::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn delay_grows_with_exponential_backoff() {
        let middleware = RetryMiddleware::new(RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            ceiling: Duration::from_secs(30),
            jitter: 0.0,
        });
        assert_eq!(middleware.delay_for(1), Duration::from_secs(1));
        assert_eq!(middleware.delay_for(2), Duration::from_secs(2));
        assert_eq!(middleware.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_respects_ceiling() {
        let middleware = RetryMiddleware::new(RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            ceiling: Duration::from_secs(10),
            jitter: 0.0,
        });
        assert_eq!(middleware.delay_for(10), Duration::from_secs(10));
    }
}
