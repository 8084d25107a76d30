// milhouse-runtime/src/middlewares/circuit_breaker.rs
// ============================================================================
// Module: Circuit-Breaker Middleware
// Description: Rolling-window failure counter with closed/open/half-open
//              states.
// Purpose: Stop dispatching to an engine that is failing persistently,
//          rather than exhausting retries against it forever.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! Closed: calls pass through, failures are counted in a rolling window.
//! Open: calls are rejected immediately with [`RuntimeError::CircuitOpen`]
//! until `reset_timeout` elapses. Half-open: exactly one trial call is let
//! through; success closes the breaker, failure reopens it.

use std::collections::VecDeque;
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

/// Configuration for [`CircuitBreakerMiddleware`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerPolicy {
    /// Failures within `window` needed to open the breaker.
    pub failure_threshold: usize,
    /// Rolling window over which failures are counted.
    pub window: Duration,
    /// Time the breaker stays open before allowing a half-open trial.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self { failure_threshold: 5, window: Duration::from_secs(60), reset_timeout: Duration::from_secs(30) }
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until `opened_at + reset_timeout` elapses.
    Open,
    /// One trial call is in flight or about to be let through.
    HalfOpen,
}

/// Mutable breaker state, guarded by an async mutex.
struct BreakerState {
    /// Current state.
    state: State,
    /// Timestamps of failures still inside the rolling window.
    failures: VecDeque<Instant>,
    /// When the breaker most recently opened.
    opened_at: Option<Instant>,
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Rolling-window circuit breaker around the inner chain.
pub struct CircuitBreakerMiddleware {
    /// Configuration.
    policy: CircuitBreakerPolicy,
    /// Shared breaker state.
    state: Mutex<BreakerState>,
}

impl CircuitBreakerMiddleware {
    /// Creates a circuit breaker under `policy`, starting closed.
    #[must_use]
    pub fn new(policy: CircuitBreakerPolicy) -> Self {
        Self { policy, state: Mutex::new(BreakerState { state: State::Closed, failures: VecDeque::new(), opened_at: None }) }
    }

    /// Checks whether a call may proceed right now, transitioning
    /// open → half-open if the reset timeout has elapsed.
    async fn admit(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().await;
        match state.state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let opened_at = state.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.policy.reset_timeout {
                    state.state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(RuntimeError::CircuitOpen { reset_in: self.policy.reset_timeout - elapsed })
                }
            }
        }
    }

    /// Records the outcome of a call, updating the state machine.
    async fn record(&self, succeeded: bool) {
        let mut state = self.state.lock().await;
        if succeeded {
            state.state = State::Closed;
            state.failures.clear();
            state.opened_at = None;
            return;
        }

        if state.state == State::HalfOpen {
            state.state = State::Open;
            state.opened_at = Some(Instant::now());
            return;
        }

        let now = Instant::now();
        state.failures.push_back(now);
        while let Some(&front) = state.failures.front() {
            if now.duration_since(front) > self.policy.window {
                state.failures.pop_front();
            } else {
                break;
            }
        }
        if state.failures.len() >= self.policy.failure_threshold {
            state.state = State::Open;
            state.opened_at = Some(now);
        }
    }
}

#[async_trait]
impl Middleware for CircuitBreakerMiddleware {
    fn name(&self) -> &str {
        "circuit_breaker"
    }

    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        self.admit().await?;
        let result = next.call(request, context).await;
        self.record(result.is_ok()).await;
        result
    }
}
