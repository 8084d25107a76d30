// milhouse-runtime/src/middlewares/concurrency.rs
// ============================================================================
// Module: Concurrency Middleware
// Description: Semaphore-bound concurrent invocation limiter.
// Purpose: Cap how many invocations of one engine run simultaneously.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! Holds a permit for the duration of the inner chain. Retries consume the
//! same slot as their original attempt, since the permit is held across the
//! whole `around` call, not per attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

/// Bounds the number of concurrent invocations passing through this
/// middleware instance.
pub struct ConcurrencyMiddleware {
    /// Shared permit pool.
    permits: Arc<Semaphore>,
}

impl ConcurrencyMiddleware {
    /// Creates a concurrency limiter with `permits` simultaneous slots.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(permits.max(1))) }
    }

    /// Creates a concurrency limiter sharing an existing permit pool, for a
    /// global cap layered alongside a per-engine one.
    #[must_use]
    pub const fn shared(permits: Arc<Semaphore>) -> Self {
        Self { permits }
    }
}

#[async_trait]
impl Middleware for ConcurrencyMiddleware {
    fn name(&self) -> &str {
        "concurrency"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        let _permit = self.permits.acquire().await.map_err(|_closed| RuntimeError::RateLimited)?;
        next.call(request, context).await
    }
}
