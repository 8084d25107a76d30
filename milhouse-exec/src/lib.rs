// milhouse-exec/src/lib.rs
// ============================================================================
// Module: Milhouse Executor
// Description: Run-scoped state persistence, the audit log, the VCS
//              adapter, issue scheduling, the per-issue worker, the
//              verification gate engine, the AI verifier, and the
//              bounded-concurrency issue pool.
// Purpose: Implement the exec and verify phases end to end: take a
//          consolidated task graph and drive it to merged branches and a
//          final pass/fail verdict.
// Dependencies: milhouse-core, milhouse-config, milhouse-engines,
//               milhouse-runtime, milhouse-stream, async-trait, tokio,
//               rand, regex, serde, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! This crate owns everything downstream of the consolidated task graph.
//! [`store`] and [`audit`] persist state; [`vcs`] wraps `git`; [`schedule`]
//! groups and orders tasks by issue; [`worker`] drives one issue's worktree
//! through execution, partial-completion detection, and merge; [`pool`]
//! fans workers out under a concurrency bound; [`gates`], [`safety`], and
//! [`verifier`] implement the verify phase.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod audit;
mod error;
mod gates;
mod pool;
mod safety;
mod schedule;
mod store;
mod verifier;
mod vcs;
mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::actions;
pub use audit::AuditFilter;
pub use audit::AuditLog;
pub use error::ExecError;
pub use error::GateError;
pub use error::StoreError;
pub use error::VcsError;
pub use gates::run_all_gates;
pub use gates::EvidenceKind;
pub use gates::GateEvidence;
pub use gates::GateReport;
pub use pool::IssuePool;
pub use pool::PromptBuilder;
pub use pool::DEFAULT_MAX_CONCURRENT;
pub use safety::CommandSafetyPolicy;
pub use safety::PolicyResult;
pub use schedule::order_groups_by_severity;
pub use schedule::partition_by_issue;
pub use schedule::IssueGroup;
pub use store::atomic_write_json;
pub use store::FsRunStateStore;
pub use store::RunStateStore;
pub use verifier::run_ai_verifier;
pub use verifier::GateCommentary;
pub use verifier::VerifierVerdict;
pub use vcs::GitCli;
pub use vcs::Vcs;
pub use worker::run_issue_worker;
pub use worker::BranchStatus;
pub use worker::WorkerOutcome;
