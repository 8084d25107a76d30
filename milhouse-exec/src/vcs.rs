// milhouse-exec/src/vcs.rs
// ============================================================================
// Module: Version Control Adapter
// Description: The documented VCS operation set, backed by shelling out to
//              the `git` binary.
// Purpose: Give the issue worker and merger a narrow, testable surface
//          instead of scattering `git` invocations through the executor.
// Dependencies: tokio, async-trait
// ============================================================================

//! ## Overview
//! [`Vcs`] exposes exactly the operation set the worker and merge phase
//! need; [`GitCli`] implements it by spawning `git -C <repo>` once per call,
//! the same shelling-out approach used elsewhere in the corpus for VCS
//! access rather than a git-object library.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::VcsError;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// The version-control operation set consumed by the issue worker and
/// merge phase.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Returns the name of the currently checked-out branch.
    async fn current_branch(&self) -> Result<String, VcsError>;
    /// Creates `name` off `base` without checking it out.
    async fn create_branch(&self, name: &str, base: &str) -> Result<(), VcsError>;
    /// Checks out `name`.
    async fn checkout(&self, name: &str) -> Result<(), VcsError>;
    /// Stages every change in the working tree.
    async fn add_all(&self) -> Result<(), VcsError>;
    /// Commits staged changes with `message`.
    async fn commit(&self, message: &str) -> Result<(), VcsError>;
    /// Returns whether the working tree has uncommitted changes.
    async fn has_changes(&self) -> Result<bool, VcsError>;
    /// Returns up to `limit` commit lines on `branch`, newest first, each
    /// formatted as `"<sha> <subject>"`.
    async fn log(&self, branch: &str, limit: u32) -> Result<Vec<String>, VcsError>;
    /// Rebases `branch` onto `onto`.
    ///
    /// Returns `Err(VcsError::Conflict { .. })` rather than
    /// `CommandFailed` when the rebase stops on a conflict, so callers can
    /// distinguish "needs `rebase_abort`" from any other failure.
    async fn rebase(&self, branch: &str, onto: &str) -> Result<(), VcsError>;
    /// Aborts an in-progress rebase.
    async fn rebase_abort(&self) -> Result<(), VcsError>;
    /// Merges `branch` into the current branch.
    async fn merge(&self, branch: &str) -> Result<(), VcsError>;
    /// Deletes `name`, forcing deletion of unmerged history when `force`.
    async fn delete_branch(&self, name: &str, force: bool) -> Result<(), VcsError>;
    /// Adds a worktree at `path` rooted at `branch`.
    async fn worktree_add(&self, path: &Path, branch: &str) -> Result<(), VcsError>;
    /// Removes the worktree at `path`, forcing removal of a dirty tree when
    /// `force`.
    async fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), VcsError>;
    /// Stashes the working tree.
    async fn stash_push(&self) -> Result<(), VcsError>;
    /// Pops a stash entry, `reference` defaulting to the most recent when
    /// empty.
    async fn stash_pop(&self, reference: &str) -> Result<(), VcsError>;
    /// Returns an adapter of the same kind bound to `path` instead of this
    /// adapter's own working directory.
    ///
    /// Working-tree-dependent calls (`has_changes`, `add_all`, `commit`,
    /// `log`) must run against the worktree they're recording, not the
    /// shared repo-rooted instance — `scoped` is how callers get that
    /// instance without knowing the concrete adapter type. Branch-level
    /// operations (`rebase`, `merge`, `delete_branch`, `worktree_add`,
    /// `worktree_remove`) stay on the shared instance, since they operate
    /// on the repository as a whole rather than one worktree.
    fn scoped(&self, path: &Path) -> Box<dyn Vcs>;
}

// ============================================================================
// SECTION: Git CLI Implementation
// ============================================================================

/// [`Vcs`] implemented by spawning the `git` binary.
pub struct GitCli {
    /// Working directory `git -C` runs against.
    repo_path: PathBuf,
}

impl GitCli {
    /// Creates an adapter operating against `repo_path`.
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<(bool, String, String), VcsError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .output()
            .await
            .map_err(|source| VcsError::Spawn(source.to_string()))?;
        Ok((output.status.success(), String::from_utf8_lossy(&output.stdout).into_owned(), String::from_utf8_lossy(&output.stderr).into_owned()))
    }

    async fn run_ok(&self, command: &str, args: &[&str]) -> Result<String, VcsError> {
        let (success, stdout, stderr) = self.run(args).await?;
        if success {
            Ok(stdout)
        } else {
            Err(VcsError::CommandFailed { command: command.to_owned(), code: -1, stderr })
        }
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn current_branch(&self) -> Result<String, VcsError> {
        let stdout = self.run_ok("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(stdout.trim().to_owned())
    }

    async fn create_branch(&self, name: &str, base: &str) -> Result<(), VcsError> {
        self.run_ok("branch", &["branch", name, base]).await.map(|_| ())
    }

    async fn checkout(&self, name: &str) -> Result<(), VcsError> {
        self.run_ok("checkout", &["checkout", name]).await.map(|_| ())
    }

    async fn add_all(&self) -> Result<(), VcsError> {
        self.run_ok("add", &["add", "-A"]).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.run_ok("commit", &["commit", "-m", message]).await.map(|_| ())
    }

    async fn has_changes(&self) -> Result<bool, VcsError> {
        let stdout = self.run_ok("status", &["status", "--porcelain"]).await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn log(&self, branch: &str, limit: u32) -> Result<Vec<String>, VcsError> {
        let limit_arg = format!("-{limit}");
        let stdout = self.run_ok("log", &["log", &limit_arg, "--pretty=%H %s", branch]).await?;
        Ok(stdout.lines().map(str::to_owned).collect())
    }

    async fn rebase(&self, branch: &str, onto: &str) -> Result<(), VcsError> {
        let (success, _stdout, stderr) = self.run(&["rebase", onto, branch]).await?;
        if success {
            return Ok(());
        }
        if stderr.contains("CONFLICT") || stderr.contains("conflict") {
            return Err(VcsError::Conflict { command: "rebase".to_owned() });
        }
        Err(VcsError::CommandFailed { command: "rebase".to_owned(), code: -1, stderr })
    }

    async fn rebase_abort(&self) -> Result<(), VcsError> {
        self.run_ok("rebase --abort", &["rebase", "--abort"]).await.map(|_| ())
    }

    async fn merge(&self, branch: &str) -> Result<(), VcsError> {
        let (success, _stdout, stderr) = self.run(&["merge", "--no-edit", branch]).await?;
        if success {
            return Ok(());
        }
        if stderr.contains("CONFLICT") || stderr.contains("conflict") {
            return Err(VcsError::Conflict { command: "merge".to_owned() });
        }
        Err(VcsError::CommandFailed { command: "merge".to_owned(), code: -1, stderr })
    }

    async fn delete_branch(&self, name: &str, force: bool) -> Result<(), VcsError> {
        let flag = if force { "-D" } else { "-d" };
        self.run_ok("branch -d", &["branch", flag, name]).await.map(|_| ())
    }

    async fn worktree_add(&self, path: &Path, branch: &str) -> Result<(), VcsError> {
        let path_str = path.to_string_lossy().into_owned();
        self.run_ok("worktree add", &["worktree", "add", &path_str, branch]).await.map(|_| ())
    }

    async fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), VcsError> {
        let path_str = path.to_string_lossy().into_owned();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        self.run_ok("worktree remove", &args).await.map(|_| ())
    }

    async fn stash_push(&self) -> Result<(), VcsError> {
        self.run_ok("stash push", &["stash", "push"]).await.map(|_| ())
    }

    async fn stash_pop(&self, reference: &str) -> Result<(), VcsError> {
        if reference.is_empty() {
            self.run_ok("stash pop", &["stash", "pop"]).await.map(|_| ())
        } else {
            self.run_ok("stash pop", &["stash", "pop", reference]).await.map(|_| ())
        }
    }

    fn scoped(&self, path: &Path) -> Box<dyn Vcs> {
        Box::new(Self::new(path.to_path_buf()))
    }
}
