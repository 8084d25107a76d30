// milhouse-exec/src/pool.rs
// ============================================================================
// Module: Issue Pool
// Description: Bounded-concurrency fan-out of issue workers.
// Purpose: Run up to `max_concurrent` issue workers at once, in severity
//          order, collecting every outcome even when individual workers
//          fail.
// Dependencies: tokio, milhouse-core
// ============================================================================

//! ## Overview
//! [`IssuePool::run`] dispatches [`IssueGroup`] values, already ordered by
//! [`crate::schedule::order_groups_by_severity`], onto a [`tokio::sync::Semaphore`]-bounded
//! set of concurrent workers. Cancelling the pool (`cancel()`) stops it from
//! dispatching any group not already running; in-flight workers run to
//! their natural completion rather than being killed mid-engine-call, since
//! severing a subprocess mid-write risks leaving the worktree in a half
//!-committed state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use milhouse_core::Issue;
use milhouse_core::Task;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::audit::AuditLog;
use crate::error::ExecError;
use crate::schedule::IssueGroup;
use crate::store::RunStateStore;
use crate::vcs::Vcs;
use crate::worker::run_issue_worker;
use crate::worker::WorkerOutcome;

/// Default bound on concurrently running issue workers.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Prompt builder shared across every spawned worker.
pub type PromptBuilder = dyn Fn(&Issue, &Task) -> String + Send + Sync;

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Runs a bounded set of issue workers concurrently.
pub struct IssuePool {
    /// Repository root.
    root: Arc<PathBuf>,
    /// Owning run id.
    run_id: Arc<str>,
    /// Branch workers rebase onto and merge into.
    base_branch: Arc<str>,
    /// VCS adapter, shared read-only across workers.
    vcs: Arc<dyn Vcs>,
    /// State store, shared across workers.
    store: Arc<dyn RunStateStore>,
    /// Audit log, shared across workers.
    audit: Arc<AuditLog>,
    /// Middleware-wrapped executor, shared across workers.
    executor: Arc<milhouse_runtime::MiddlewareExecutor>,
    /// Whether a worker aborts its own remaining tasks on first failure.
    fail_fast: bool,
    /// Builds the per-task executor prompt.
    build_prompt: Arc<PromptBuilder>,
    /// Bounds concurrently running workers.
    permits: Arc<Semaphore>,
    /// Set once the pool should stop dispatching new groups.
    cancelled: Arc<AtomicBool>,
}

impl IssuePool {
    /// Creates a pool bounded to `max_concurrent` simultaneously running
    /// issue workers.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "the pool's collaborators mirror run_issue_worker's, which documents why they stay distinct")]
    pub fn new(
        root: impl Into<PathBuf>,
        run_id: impl Into<String>,
        base_branch: impl Into<String>,
        vcs: Arc<dyn Vcs>,
        store: Arc<dyn RunStateStore>,
        audit: Arc<AuditLog>,
        executor: Arc<milhouse_runtime::MiddlewareExecutor>,
        fail_fast: bool,
        max_concurrent: usize,
        build_prompt: Arc<PromptBuilder>,
    ) -> Self {
        Self {
            root: Arc::new(root.into()),
            run_id: Arc::from(run_id.into()),
            base_branch: Arc::from(base_branch.into()),
            vcs,
            store,
            audit,
            executor,
            fail_fast,
            build_prompt,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals the pool to stop dispatching groups that have not yet
    /// started; groups already running are left to finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs every group to completion, respecting the concurrency bound.
    ///
    /// Returns one entry per group that was dispatched, in completion order;
    /// a group skipped by cancellation before it started is not present in
    /// the result. A worker's own error is carried in its `Result` entry
    /// rather than aborting the other workers.
    pub async fn run(&self, groups: Vec<IssueGroup>) -> Vec<Result<WorkerOutcome, ExecError>> {
        let mut joins: JoinSet<Result<WorkerOutcome, ExecError>> = JoinSet::new();

        for group in groups {
            if self.is_cancelled() {
                warn!(issue_id = %group.issue.id, "pool cancelled; skipping undispatched group");
                continue;
            }

            let permits = Arc::clone(&self.permits);
            let root = Arc::clone(&self.root);
            let run_id = Arc::clone(&self.run_id);
            let base_branch = Arc::clone(&self.base_branch);
            let vcs = Arc::clone(&self.vcs);
            let store = Arc::clone(&self.store);
            let audit = Arc::clone(&self.audit);
            let executor = Arc::clone(&self.executor);
            let fail_fast = self.fail_fast;
            let build_prompt = Arc::clone(&self.build_prompt);

            joins.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| ExecError::Store(crate::error::StoreError::Io("semaphore closed".to_owned())))?;
                run_issue_worker(
                    group,
                    root.as_path(),
                    &run_id,
                    &base_branch,
                    vcs.as_ref(),
                    store.as_ref(),
                    audit.as_ref(),
                    executor.as_ref(),
                    fail_fast,
                    |issue, task| build_prompt(issue, task),
                )
                .await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(result) => outcomes.push(result),
                Err(join_error) => outcomes.push(Err(ExecError::Store(crate::error::StoreError::Io(format!("worker task panicked: {join_error}"))))),
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use milhouse_core::Execution;
    use milhouse_core::Issue;
    use milhouse_core::IssueId;
    use milhouse_core::Run;
    use milhouse_core::RunId;
    use milhouse_core::Task;
    use milhouse_core::TaskId;
    use milhouse_engines::plugins::claude::ClaudePlugin;
    use milhouse_runtime::MiddlewareExecutor;

    use super::IssuePool;
    use crate::audit::AuditLog;
    use crate::error::StoreError;
    use crate::error::VcsError;
    use crate::store::RunStateStore;
    use crate::vcs::Vcs;

    struct NeverCalledVcs;

    #[async_trait]
    impl Vcs for NeverCalledVcs {
        async fn current_branch(&self) -> Result<String, VcsError> {
            unreachable!("no group is dispatched in this test")
        }
        async fn create_branch(&self, _name: &str, _base: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn checkout(&self, _name: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn add_all(&self) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn commit(&self, _message: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn has_changes(&self) -> Result<bool, VcsError> {
            unreachable!()
        }
        async fn log(&self, _branch: &str, _limit: u32) -> Result<Vec<String>, VcsError> {
            unreachable!()
        }
        async fn rebase(&self, _branch: &str, _onto: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn rebase_abort(&self) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn merge(&self, _branch: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn delete_branch(&self, _name: &str, _force: bool) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn worktree_add(&self, _path: &Path, _branch: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn worktree_remove(&self, _path: &Path, _force: bool) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn stash_push(&self) -> Result<(), VcsError> {
            unreachable!()
        }
        async fn stash_pop(&self, _reference: &str) -> Result<(), VcsError> {
            unreachable!()
        }
        fn scoped(&self, _path: &Path) -> Box<dyn Vcs> {
            unreachable!()
        }
    }

    struct NeverCalledStore;

    #[async_trait]
    impl RunStateStore for NeverCalledStore {
        async fn save_run(&self, _run: &Run) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn load_run(&self, _run_id: &RunId) -> Result<Run, StoreError> {
            unreachable!()
        }
        async fn save_issue(&self, _run_id: &RunId, _issue: &Issue) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn load_issues(&self, _run_id: &RunId) -> Result<Vec<Issue>, StoreError> {
            unreachable!()
        }
        async fn load_issue(&self, _run_id: &RunId, _issue_id: &IssueId) -> Result<Issue, StoreError> {
            unreachable!()
        }
        async fn save_task(&self, _run_id: &RunId, _task: &Task) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn load_tasks(&self, _run_id: &RunId) -> Result<Vec<Task>, StoreError> {
            unreachable!()
        }
        async fn load_task(&self, _run_id: &RunId, _task_id: &TaskId) -> Result<Task, StoreError> {
            unreachable!()
        }
        async fn save_execution(&self, _run_id: &RunId, _execution: &Execution) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn load_executions(&self, _run_id: &RunId) -> Result<Vec<Execution>, StoreError> {
            unreachable!()
        }
    }

    fn test_pool() -> IssuePool {
        let executor = MiddlewareExecutor::new(Arc::new(ClaudePlugin::new()), Vec::new());
        IssuePool::new(
            "/tmp/milhouse-pool-test",
            "run-20260101-000000-aaaa",
            "main",
            Arc::new(NeverCalledVcs),
            Arc::new(NeverCalledStore),
            Arc::new(AuditLog::new("/tmp/milhouse-pool-test/audit.jsonl")),
            Arc::new(executor),
            false,
            super::DEFAULT_MAX_CONCURRENT,
            Arc::new(|_issue: &Issue, _task: &Task| String::new()),
        )
    }

    #[tokio::test]
    async fn empty_group_list_dispatches_nothing() {
        let pool = test_pool();
        let outcomes = pool.run(Vec::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn cancelling_before_run_skips_every_group() {
        let pool = test_pool();
        pool.cancel();
        assert!(pool.is_cancelled());
        let issue = Issue::new_unvalidated(IssueId::new("P-skip"), "symptom", "hypothesis", milhouse_core::Severity::Low);
        let group = crate::schedule::IssueGroup { issue, tasks: Vec::new() };
        let outcomes = pool.run(vec![group]).await;
        assert!(outcomes.is_empty());
    }
}
