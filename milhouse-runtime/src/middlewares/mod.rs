// milhouse-runtime/src/middlewares/mod.rs
// ============================================================================
// Module: Built-In Middlewares
// Description: The six default interceptors: logging, timeout, retry,
//              rate-limit, concurrency, circuit-breaker.
// Purpose: Compose the default middleware stack in the documented order.
// Dependencies: crate::middleware
// ============================================================================

//! ## Overview
//! [`default_stack`] returns the six built-in middlewares in their fixed
//! execution order. Callers needing a custom stack construct their own
//! `Vec<Arc<dyn Middleware>>` instead.

pub mod circuit_breaker;
pub mod concurrency;
pub mod logging;
pub mod rate_limit;
pub mod retry;
pub mod timeout;

use std::sync::Arc;

use crate::middleware::Middleware;

/// Builds the default middleware stack, outermost-first:
/// logging → timeout → retry → rate-limit → concurrency → circuit-breaker.
#[must_use]
pub fn default_stack(
    concurrency_permits: usize,
    rate_limit: rate_limit::RateLimitPolicy,
    circuit_breaker: circuit_breaker::CircuitBreakerPolicy,
) -> Vec<Arc<dyn Middleware>> {
    vec![
        Arc::new(logging::LoggingMiddleware::new()),
        Arc::new(timeout::TimeoutMiddleware::new(timeout::TimeoutPolicy::default())),
        Arc::new(retry::RetryMiddleware::new(retry::RetryPolicy::default())),
        Arc::new(rate_limit::RateLimitMiddleware::new(rate_limit)),
        Arc::new(concurrency::ConcurrencyMiddleware::new(concurrency_permits)),
        Arc::new(circuit_breaker::CircuitBreakerMiddleware::new(circuit_breaker)),
    ]
}
