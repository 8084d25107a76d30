// milhouse-runtime/src/middlewares/rate_limit.rs
// ============================================================================
// Module: Rate-Limit Middleware
// Description: Token-bucket scheduler with a minimum inter-invocation
//              spacing and a configurable overflow policy.
// Purpose: Keep engine invocation rate under vendor-imposed limits.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! The bucket refills to full once per 60s; a minimum spacing of 100ms
//! (default) is enforced between successive permits regardless of bucket
//! state. On empty bucket, the configured [`OverflowPolicy`] decides whether
//! to wait (`Block`), drop the oldest waiter (`Leak`), or proceed anyway
//! (`Overflow`).

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// How the rate limiter behaves when the bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait until a permit becomes available.
    Block,
    /// Drop the request immediately with [`RuntimeError::RateLimited`].
    Leak,
    /// Proceed anyway, ignoring the empty bucket.
    Overflow,
}

/// Configuration for [`RateLimitMiddleware`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Bucket capacity.
    pub bucket_capacity: u32,
    /// Interval over which the bucket refills to full.
    pub refill_interval: Duration,
    /// Minimum spacing enforced between successive permits.
    pub min_spacing: Duration,
    /// Behavior when the bucket is empty.
    pub overflow: OverflowPolicy,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            bucket_capacity: 1,
            refill_interval: Duration::from_secs(60),
            min_spacing: Duration::from_millis(100),
            overflow: OverflowPolicy::Block,
        }
    }
}

// ============================================================================
// SECTION: Bucket State
// ============================================================================

/// Mutable token-bucket state, guarded by an async mutex.
#[derive(Debug)]
struct BucketState {
    /// Tokens currently available.
    tokens: f64,
    /// Last time the bucket was refilled.
    last_refill: Instant,
    /// Last time a permit was granted.
    last_grant: Option<Instant>,
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Token-bucket rate limiter with minimum inter-invocation spacing.
pub struct RateLimitMiddleware {
    /// Configuration.
    policy: RateLimitPolicy,
    /// Shared bucket state.
    state: Mutex<BucketState>,
}

impl RateLimitMiddleware {
    /// Creates a rate limiter under `policy`, starting with a full bucket.
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: f64::from(policy.bucket_capacity),
                last_refill: Instant::now(),
                last_grant: None,
            }),
            policy,
        }
    }

    /// Blocks until a token is available, consuming it, unless the overflow
    /// policy says otherwise.
    async fn acquire(&self) -> Result<(), RuntimeError> {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                let refill_rate = f64::from(self.policy.bucket_capacity) / self.policy.refill_interval.as_secs_f64();
                state.tokens = (state.tokens + elapsed * refill_rate).min(f64::from(self.policy.bucket_capacity));
                state.last_refill = now;

                let spacing_wait = state
                    .last_grant
                    .map(|last| self.policy.min_spacing.saturating_sub(now.duration_since(last)))
                    .unwrap_or_default();

                if state.tokens >= 1.0 && spacing_wait.is_zero() {
                    state.tokens -= 1.0;
                    state.last_grant = Some(now);
                    return Ok(());
                }

                match self.policy.overflow {
                    OverflowPolicy::Overflow => {
                        state.last_grant = Some(now);
                        return Ok(());
                    }
                    OverflowPolicy::Leak => return Err(RuntimeError::RateLimited),
                    OverflowPolicy::Block => {
                        if !spacing_wait.is_zero() {
                            spacing_wait
                        } else {
                            Duration::from_secs_f64(1.0 / refill_rate.max(f64::EPSILON))
                        }
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "rate_limit"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        self.acquire().await?;
        next.call(request, context).await
    }
}
