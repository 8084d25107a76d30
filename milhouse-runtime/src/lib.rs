// milhouse-runtime/src/lib.rs
// ============================================================================
// Module: Milhouse Runtime
// Description: The middleware-wrapped executor: request/context shapes, the
//              middleware contract, six built-in interceptors, the process
//              lifecycle, and the failover helper.
// Purpose: Turn a validated execution request into a single engine
//          invocation with logging, timeout, retry, rate-limit,
//          concurrency, and circuit-breaker protection.
// Dependencies: milhouse-core, milhouse-engines, milhouse-stream,
//               async-trait, tokio, rand, tracing, thiserror
// ============================================================================

//! ## Overview
//! `MiddlewareExecutor` composes an [`EnginePlugin`](milhouse_engines::EnginePlugin)
//! with a [`Middleware`] stack and drives the subprocess lifecycle. The
//! default stack, in order, is logging, timeout, retry, rate-limit,
//! concurrency, circuit-breaker; callers may build a custom stack from the
//! same building blocks.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod error;
mod executor;
mod failover;
mod middleware;
pub mod middlewares;
mod request;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::RuntimeError;
pub use executor::MiddlewareExecutor;
pub use executor::StepCallback;
pub use failover::try_in_order;
pub use middleware::ExecutionOutcome;
pub use middleware::Handler;
pub use middleware::HandlerFuture;
pub use middleware::Middleware;
pub use middleware::Next;
pub use request::ExecutionContext;
pub use request::ExecutionRequest;
pub use request::OutputFormat;
