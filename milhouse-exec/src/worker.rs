// milhouse-exec/src/worker.rs
// ============================================================================
// Module: Per-Issue Worker
// Description: Drives one issue's tasks through worktree provisioning,
//              ordered execution, partial-completion detection, and the
//              rebase/merge phase.
// Purpose: Implement the documented six-step per-issue worker so the pool
//          (`crate::pool`) only has to fan out and collect outcomes.
// Dependencies: milhouse-core, milhouse-runtime, tokio, regex, tracing
// ============================================================================

//! ## Overview
//! [`run_issue_worker`] performs, in order: worktree provisioning (with
//! stale-worktree force-removal and auto-stash-if-dirty), topological
//! intra-issue task ordering, per-task execution through the
//! middleware-wrapped executor, partial-completion detection by scanning
//! the branch's commit log, and a rebase-then-merge-then-abort-preserve
//! merge phase. The caller supplies a prompt builder so this module stays
//! independent of the plan phase's WBS markdown format.
//!
//! Once the worktree exists, every working-tree-dependent call
//! (`has_changes`, `add_all`, `commit`, `log`) runs through a
//! `vcs.scoped(&worktree_path)` instance, not the shared repo-rooted one —
//! concurrent workers for different issues each get their own worktree and
//! must record *that* worktree's diff, not whatever happens to be dirty in
//! the shared checkout. The shared instance is still used for everything
//! that legitimately operates on the repository as a whole: branch
//! creation, worktree add/remove, and the rebase/merge/delete of the
//! merge phase.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::path::Path;

use milhouse_core::AgentRole;
use milhouse_core::Execution;
use milhouse_core::ExecutionId;
use milhouse_core::Issue;
use milhouse_core::Task;
use milhouse_core::TaskId;
use milhouse_core::TaskStatus;
use milhouse_core::Timestamp;
use milhouse_runtime::ExecutionContext;
use milhouse_runtime::ExecutionRequest;
use milhouse_runtime::MiddlewareExecutor;
use regex::Regex;
use tracing::warn;

use crate::audit::actions;
use crate::audit::AuditLog;
use crate::error::ExecError;
use crate::schedule::IssueGroup;
use crate::store::RunStateStore;
use crate::vcs::Vcs;

/// Autostash destination branch used when the base working tree is dirty
/// ahead of worktree provisioning.
const AUTOSTASH_BRANCH: &str = "milhouse-autostash";

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Final classification of one issue's worker branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    /// Every task is `done` and the branch merged cleanly.
    Complete,
    /// Some tasks `done`, others `failed` or `merge_error`.
    Partial,
    /// No tasks completed.
    Failed,
}

/// Result of running one issue's worker to completion.
pub struct WorkerOutcome {
    /// The issue this worker processed.
    pub issue_id: milhouse_core::IssueId,
    /// Final status for every task in the group, in execution order.
    pub tasks: Vec<Task>,
    /// Branch-level classification.
    pub branch_status: BranchStatus,
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Runs one issue-group's worker to completion.
///
/// `build_prompt` produces the deterministic, role-tagged (`EX`) executor
/// prompt for one task given the issue and task record.
///
/// # Errors
///
/// Returns [`ExecError`] for state-store or VCS failures that prevent the
/// worker from making progress at all; task-level engine failures are
/// recorded on the task instead of aborting the worker.
#[allow(clippy::too_many_arguments, reason = "the worker's collaborators are all independently substitutable boundaries; bundling them would hide that from call sites")]
pub async fn run_issue_worker(
    group: IssueGroup,
    root: &Path,
    run_id: &str,
    base_branch: &str,
    vcs: &dyn Vcs,
    store: &dyn RunStateStore,
    audit: &AuditLog,
    executor: &MiddlewareExecutor,
    fail_fast: bool,
    build_prompt: impl Fn(&Issue, &Task) -> String,
) -> Result<WorkerOutcome, ExecError> {
    let issue_id = group.issue.id.clone();
    let branch = format!("milhouse/{}", issue_id.as_str());
    let worktree_path = root.join("runs").join(run_id).join("worktrees").join(issue_id.as_str());

    provision_worktree(vcs, &worktree_path, &branch, base_branch).await?;
    let worktree_vcs = vcs.scoped(&worktree_path);

    let mut tasks = topological_order(group.tasks);

    for task in &mut tasks {
        if fail_fast && tasks_have_failure(&tasks) {
            break;
        }
        execute_one_task(task, &group.issue, &worktree_path, &branch, worktree_vcs.as_ref(), store, audit, run_id, executor, &build_prompt).await?;
    }

    detect_partial_completions(&mut tasks, vcs, &issue_id).await?;
    for task in &tasks {
        store.save_task(&core_run_id(run_id), task).await?;
    }

    let branch_status = merge_phase(vcs, &worktree_path, &branch, base_branch, &mut tasks).await?;
    for task in &tasks {
        store.save_task(&core_run_id(run_id), task).await?;
    }

    Ok(WorkerOutcome { issue_id, tasks, branch_status })
}

fn core_run_id(run_id: &str) -> milhouse_core::RunId {
    milhouse_core::RunId::new(run_id)
}

// ============================================================================
// SECTION: Step 1 — Worktree Provisioning
// ============================================================================

async fn provision_worktree(vcs: &dyn Vcs, worktree_path: &Path, branch: &str, base_branch: &str) -> Result<(), ExecError> {
    if tokio::fs::metadata(worktree_path).await.is_ok() {
        warn!(path = %worktree_path.display(), "removing stale worktree before provisioning");
        vcs.worktree_remove(worktree_path, true).await?;
    }

    if vcs.has_changes().await? {
        vcs.stash_push().await?;
        let _ = vcs.create_branch(AUTOSTASH_BRANCH, base_branch).await;
    }

    vcs.create_branch(branch, base_branch).await.or_else(|error| match error {
        crate::error::VcsError::CommandFailed { .. } => Ok(()),
        other => Err(other),
    })?;
    vcs.worktree_add(worktree_path, branch).await?;
    Ok(())
}

// ============================================================================
// SECTION: Step 2 — Intra-Issue Ordering
// ============================================================================

/// Orders `tasks` topologically by `depends_on`, restricted to dependencies
/// within the same group (cross-group dependencies are logged and ignored).
/// Ties resolve by `parallel_group` ascending, then task id.
fn topological_order(tasks: Vec<Task>) -> Vec<Task> {
    let known_ids: HashSet<TaskId> = tasks.iter().map(|task| task.id.clone()).collect();
    let mut remaining = tasks;
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut placed: HashSet<TaskId> = HashSet::new();

    while !remaining.is_empty() {
        let mut ready: Vec<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, task)| task.depends_on.iter().filter(|dep| known_ids.contains(dep)).all(|dep| placed.contains(dep)))
            .map(|(index, _)| index)
            .collect();

        if ready.is_empty() {
            warn!("cycle or unresolved cross-group dependency detected; flushing remaining tasks in declared order");
            ready = (0..remaining.len()).collect();
        }

        ready.sort_by(|&a, &b| remaining[a].parallel_group.cmp(&remaining[b].parallel_group).then_with(|| remaining[a].id.cmp(&remaining[b].id)));

        let next_index = ready[0];
        let task = remaining.remove(next_index);
        placed.insert(task.id.clone());
        ordered.push(task);
    }

    ordered
}

// ============================================================================
// SECTION: Step 3 — Per-Task Execution
// ============================================================================

#[allow(clippy::too_many_arguments, reason = "per-task execution needs every worker collaborator; see run_issue_worker")]
async fn execute_one_task(
    task: &mut Task,
    issue: &Issue,
    worktree_path: &Path,
    branch: &str,
    vcs: &dyn Vcs,
    store: &dyn RunStateStore,
    audit: &AuditLog,
    run_id: &str,
    executor: &MiddlewareExecutor,
    build_prompt: &impl Fn(&Issue, &Task) -> String,
) -> Result<(), ExecError> {
    let before_status = task.status;
    task.status = TaskStatus::InProgress;
    task.updated_at = Timestamp::now();
    audit.append(&actions::task_status_changed(Timestamp::now(), task.id.as_str(), "EX", &format!("{before_status:?}"), "in_progress")).await?;

    let prompt = build_prompt(issue, task);
    let request = ExecutionRequest::new(prompt, worktree_path.to_path_buf(), core_run_id(run_id), AgentRole::Ex, "exec".to_owned());
    let mut context = ExecutionContext::new(&request);

    let execution_id = ExecutionId::new(format!("exec-{}-{}", task.id.as_str(), uuid_like()));
    let mut execution = Execution::started(execution_id.clone(), task.id.clone(), String::new(), Timestamp::now());
    audit.append(&actions::execution_started(Timestamp::now(), execution_id.as_str(), task.id.as_str())).await?;

    match executor.execute(&request, &mut context).await {
        Ok(outcome) => {
            let has_changes = vcs.has_changes().await.unwrap_or(false);
            let mut commit_sha = None;
            if has_changes {
                let message = format!("[{}] {}: {}", issue.id.as_str(), task.id.as_str(), task.title);
                vcs.add_all().await?;
                vcs.commit(&message).await?;
                commit_sha = vcs
                    .log(branch, 1)
                    .await
                    .ok()
                    .and_then(|lines| lines.into_iter().next())
                    .and_then(|line| line.split_once(' ').map(|(sha, _subject)| sha.to_owned()));
            }
            execution.finish_success(Timestamp::now(), outcome.tokens.input, outcome.tokens.output, commit_sha.clone());
            task.status = TaskStatus::Done;
            audit.append(&actions::execution_completed(Timestamp::now(), execution_id.as_str(), commit_sha.as_deref())).await?;
        }
        Err(error) => {
            execution.finish_failure(Timestamp::now(), error.to_string());
            task.status = TaskStatus::Failed;
            audit.append(&actions::execution_failed(Timestamp::now(), execution_id.as_str(), &error.to_string())).await?;
        }
    }

    task.updated_at = Timestamp::now();
    audit
        .append(&actions::task_status_changed(Timestamp::now(), task.id.as_str(), "EX", "in_progress", &format!("{:?}", task.status)))
        .await?;
    store.save_execution(&core_run_id(run_id), &execution).await?;
    Ok(())
}

fn tasks_have_failure(tasks: &[Task]) -> bool {
    tasks.iter().any(|task| task.status == TaskStatus::Failed)
}

/// Lightweight unique suffix for execution ids, avoiding a UUID dependency
/// for what is otherwise a process-unique, human-inspectable string.
fn uuid_like() -> String {
    let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    format!("{nanos:x}")
}

// ============================================================================
// SECTION: Step 4 — Partial-Completion Detection
// ============================================================================

async fn detect_partial_completions(tasks: &mut [Task], vcs: &dyn Vcs, issue_id: &milhouse_core::IssueId) -> Result<(), ExecError> {
    let branch = format!("milhouse/{}", issue_id.as_str());
    let Ok(subjects) = vcs.log(&branch, 1000).await else { return Ok(()) };

    #[allow(clippy::unwrap_used, reason = "the pattern is a fixed, valid literal")]
    let pattern = Regex::new(r"^\[[^\]]+\] (T-\S+):").unwrap();
    let committed_task_ids: HashSet<String> = subjects
        .iter()
        .filter_map(|line| line.split_once(' ').map(|(_sha, subject)| subject))
        .filter_map(|subject| pattern.captures(subject))
        .map(|captures| captures[1].to_owned())
        .collect();

    for task in tasks.iter_mut() {
        if task.status == TaskStatus::Pending && committed_task_ids.contains(task.id.as_str()) {
            warn!(task_id = %task.id, "commit found for pending task; marking done without re-execution");
            task.status = TaskStatus::Done;
            task.updated_at = Timestamp::now();
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Step 5 — Merge Phase
// ============================================================================

async fn merge_phase(vcs: &dyn Vcs, worktree_path: &Path, branch: &str, base_branch: &str, tasks: &mut [Task]) -> Result<BranchStatus, ExecError> {
    if !tasks.iter().any(|task| task.status == TaskStatus::Done) {
        return Ok(BranchStatus::Failed);
    }

    let merged = attempt_merge(vcs, branch, base_branch).await?;

    if merged {
        vcs.worktree_remove(worktree_path, false).await?;
        vcs.delete_branch(branch, false).await?;
        let all_done = tasks.iter().all(|task| task.status == TaskStatus::Done);
        Ok(if all_done { BranchStatus::Complete } else { BranchStatus::Partial })
    } else {
        for task in tasks.iter_mut().filter(|task| task.status == TaskStatus::Done) {
            task.status = TaskStatus::MergeError;
            task.updated_at = Timestamp::now();
        }
        warn!(%branch, "merge conflict; branch preserved untouched, see manual-merge report");
        Ok(BranchStatus::Partial)
    }
}

async fn attempt_merge(vcs: &dyn Vcs, branch: &str, base_branch: &str) -> Result<bool, ExecError> {
    match vcs.rebase(branch, base_branch).await {
        Ok(()) => {
            vcs.checkout(base_branch).await?;
            match vcs.merge(branch).await {
                Ok(()) => Ok(true),
                Err(crate::error::VcsError::Conflict { .. }) => Ok(false),
                Err(other) => Err(other.into()),
            }
        }
        Err(crate::error::VcsError::Conflict { .. }) => {
            vcs.rebase_abort().await?;
            vcs.checkout(base_branch).await?;
            match vcs.merge(branch).await {
                Ok(()) => Ok(true),
                Err(crate::error::VcsError::Conflict { .. }) => Ok(false),
                Err(other) => Err(other.into()),
            }
        }
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use milhouse_core::IssueId;
    use milhouse_core::Task;
    use milhouse_core::TaskId;
    use milhouse_core::Timestamp;

    use super::topological_order;

    #[test]
    fn dependencies_are_ordered_before_dependents() {
        let issue_id = IssueId::new("P-abc123-ffffff");
        let mut dependent = Task::new(TaskId::new("T-abc123-ffffff-02"), issue_id.clone(), "second", "d", Timestamp::now());
        dependent.depends_on = vec![TaskId::new("T-abc123-ffffff-01")];
        let dependency = Task::new(TaskId::new("T-abc123-ffffff-01"), issue_id, "first", "d", Timestamp::now());

        let ordered = topological_order(vec![dependent, dependency]);
        assert_eq!(ordered[0].id.as_str(), "T-abc123-ffffff-01");
        assert_eq!(ordered[1].id.as_str(), "T-abc123-ffffff-02");
    }
}
