// milhouse-runtime/src/middleware.rs
// ============================================================================
// Module: Middleware Contract
// Description: The Middleware trait, the single-call Next continuation, and
//              the outcome type every middleware eventually produces.
// Purpose: Let logging, timeout, retry, rate-limit, concurrency, and
//          circuit-breaker interceptors compose around one engine call.
// Dependencies: async-trait, milhouse-stream
// ============================================================================

//! ## Overview
//! Each middleware is `async fn around(request, context, next) -> Result<...>`.
//! Middlewares compose in a strict order; `next.call(...)` may be invoked at
//! most once per `around` call — a second call panics, matching the "call
//! exactly once" contract rather than silently double-executing the inner
//! chain.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use milhouse_stream::Step;
use milhouse_stream::TokenUsage;

use crate::error::RuntimeError;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

// ============================================================================
// SECTION: Execution Outcome
// ============================================================================

/// The observed result of one engine invocation after all middlewares and
/// the innermost executor have run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Whether the invocation is considered successful.
    pub success: bool,
    /// Final-response text, after extraction.
    pub final_response: String,
    /// Every step produced by the output parser.
    pub steps: Vec<Step>,
    /// Wall-clock duration of the invocation.
    pub duration: std::time::Duration,
    /// Process exit code, if the engine ran to completion.
    pub exit_code: Option<i32>,
    /// Accumulated token usage.
    pub tokens: TokenUsage,
    /// Error text, when `success` is `false`.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Handler & Next
// ============================================================================

/// Boxed future returned by the innermost handler.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<ExecutionOutcome, RuntimeError>> + Send + 'a>>;

/// The innermost operation a middleware chain eventually reaches: the
/// process-spawning executor itself.
pub trait Handler: Send + Sync {
    /// Invokes the engine for `request`, updating `context` with whatever
    /// evidence/metadata the invocation produces.
    fn call<'a>(&'a self, request: &'a ExecutionRequest, context: &'a mut ExecutionContext) -> HandlerFuture<'a>;
}

/// Continuation passed to each middleware's `around`. Calling it dispatches
/// to the next middleware in the chain, or to the innermost handler once the
/// chain is exhausted.
pub struct Next<'a> {
    /// Remaining middlewares, outermost-first.
    chain: &'a [Arc<dyn Middleware>],
    /// The innermost handler, reached once `chain` is empty.
    handler: &'a dyn Handler,
    /// Guards against calling this continuation more than once.
    called: Cell<bool>,
}

impl<'a> Next<'a> {
    /// Builds a continuation over the full middleware chain.
    #[must_use]
    pub fn new(chain: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self { chain, handler, called: Cell::new(false) }
    }

    /// Invokes the next middleware, or the innermost handler if the chain is
    /// exhausted.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same `Next` value.
    pub async fn call(
        self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        assert!(!self.called.replace(true), "Next::call invoked more than once");
        match self.chain.split_first() {
            Some((middleware, rest)) => {
                let next = Next::new(rest, self.handler);
                middleware.around(request, context, next).await
            }
            None => self.handler.call(request, context).await,
        }
    }

    /// Returns the remaining chain and innermost handler this continuation
    /// wraps, without consuming it.
    ///
    /// Reserved for [`crate::middlewares::retry::RetryMiddleware`], the one
    /// middleware that legitimately invokes the remainder of the pipeline
    /// more than once per request; every other middleware must use
    /// [`Self::call`] instead.
    pub(crate) const fn remaining(&self) -> (&'a [Arc<dyn Middleware>], &'a dyn Handler) {
        (self.chain, self.handler)
    }
}

// ============================================================================
// SECTION: Middleware Trait
// ============================================================================

/// Converts a duration to milliseconds, saturating at `u64::MAX` rather than
/// truncating silently on an out-of-range value.
#[must_use]
pub(crate) fn millis_saturating(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One interceptor in the execution middleware stack.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short, stable name used in logging and error messages.
    fn name(&self) -> &str;

    /// Wraps `next`, observing or transforming the request/outcome.
    async fn around(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        next: Next<'_>,
    ) -> Result<ExecutionOutcome, RuntimeError>;
}
