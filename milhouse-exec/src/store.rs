// milhouse-exec/src/store.rs
// ============================================================================
// Module: Run State Store
// Description: Atomic, lock-guarded, filesystem-backed persistence for runs,
//              issues, tasks, and executions.
// Purpose: Let concurrent issue workers serialize writes to the same state
//          file while leaving disjoint files free to update in parallel.
// Dependencies: async-trait, tokio, serde_json, rand
// ============================================================================

//! ## Overview
//! Every write goes through [`atomic_write_json`]: serialize to a temp
//! sibling, optionally take a PID-content lockfile (stale after 2x the
//! caller's timeout), rename temp over the final path, release the lock.
//! [`FsRunStateStore`] lays entities out one JSON file per entity under
//! `<root>/runs/<run-id>/state/`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use milhouse_core::Execution;
use milhouse_core::ExecutionId;
use milhouse_core::Issue;
use milhouse_core::IssueId;
use milhouse_core::Run;
use milhouse_core::RunId;
use milhouse_core::Task;
use milhouse_core::TaskId;
use rand::Rng;
use tokio::fs;
use tokio::time::sleep;

use crate::error::StoreError;

/// Backoff between lock-acquisition attempts.
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(50);
/// Total time a caller waits for a lock before giving up.
const LOCK_RETRY_CEILING: Duration = Duration::from_secs(5);
/// A lockfile older than 2x this multiplier's reference timeout is
/// considered abandoned and force-cleared.
const STALE_LOCK_MULTIPLIER: u32 = 2;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Persists the run-scoped entities one issue worker or gate needs to read
/// and mutate.
#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Persists `run`, creating or overwriting its record.
    async fn save_run(&self, run: &Run) -> Result<(), StoreError>;
    /// Loads a previously saved run.
    async fn load_run(&self, run_id: &RunId) -> Result<Run, StoreError>;

    /// Persists `issue` under `run_id`.
    async fn save_issue(&self, run_id: &RunId, issue: &Issue) -> Result<(), StoreError>;
    /// Loads every issue saved under `run_id`.
    async fn load_issues(&self, run_id: &RunId) -> Result<Vec<Issue>, StoreError>;
    /// Loads a single issue by id.
    async fn load_issue(&self, run_id: &RunId, issue_id: &IssueId) -> Result<Issue, StoreError>;

    /// Persists `task` under `run_id`.
    async fn save_task(&self, run_id: &RunId, task: &Task) -> Result<(), StoreError>;
    /// Loads every task saved under `run_id`.
    async fn load_tasks(&self, run_id: &RunId) -> Result<Vec<Task>, StoreError>;
    /// Loads a single task by id.
    async fn load_task(&self, run_id: &RunId, task_id: &TaskId) -> Result<Task, StoreError>;

    /// Persists `execution` under `run_id`.
    async fn save_execution(&self, run_id: &RunId, execution: &Execution) -> Result<(), StoreError>;
    /// Loads every execution saved under `run_id`.
    async fn load_executions(&self, run_id: &RunId) -> Result<Vec<Execution>, StoreError>;
}

// ============================================================================
// SECTION: Filesystem Implementation
// ============================================================================

/// Filesystem-backed [`RunStateStore`] rooted at the repository directory.
pub struct FsRunStateStore {
    /// Repository root; run subtrees live under `<root>/runs/<run-id>/`.
    root: PathBuf,
}

impl FsRunStateStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run_state_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join("runs").join(run_id.as_str()).join("state")
    }

    fn run_meta_path(&self, run_id: &RunId) -> PathBuf {
        self.run_state_dir(run_id).join("run.json")
    }

    fn issue_path(&self, run_id: &RunId, issue_id: &IssueId) -> PathBuf {
        self.run_state_dir(run_id).join("issues").join(format!("{}.json", issue_id.as_str()))
    }

    fn issues_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_state_dir(run_id).join("issues")
    }

    fn task_path(&self, run_id: &RunId, task_id: &TaskId) -> PathBuf {
        self.run_state_dir(run_id).join("tasks").join(format!("{}.json", task_id.as_str()))
    }

    fn tasks_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_state_dir(run_id).join("tasks")
    }

    fn execution_path(&self, run_id: &RunId, execution_id: &ExecutionId) -> PathBuf {
        self.run_state_dir(run_id).join("executions").join(format!("{execution_id}.json"))
    }

    fn executions_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_state_dir(run_id).join("executions")
    }
}

#[async_trait]
impl RunStateStore for FsRunStateStore {
    async fn save_run(&self, run: &Run) -> Result<(), StoreError> {
        atomic_write_json(&self.run_meta_path(&run.id), run).await
    }

    async fn load_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        read_json(&self.run_meta_path(run_id)).await
    }

    async fn save_issue(&self, run_id: &RunId, issue: &Issue) -> Result<(), StoreError> {
        atomic_write_json(&self.issue_path(run_id, &issue.id), issue).await
    }

    async fn load_issues(&self, run_id: &RunId) -> Result<Vec<Issue>, StoreError> {
        read_all_json(&self.issues_dir(run_id)).await
    }

    async fn load_issue(&self, run_id: &RunId, issue_id: &IssueId) -> Result<Issue, StoreError> {
        read_json(&self.issue_path(run_id, issue_id)).await
    }

    async fn save_task(&self, run_id: &RunId, task: &Task) -> Result<(), StoreError> {
        atomic_write_json(&self.task_path(run_id, &task.id), task).await
    }

    async fn load_tasks(&self, run_id: &RunId) -> Result<Vec<Task>, StoreError> {
        read_all_json(&self.tasks_dir(run_id)).await
    }

    async fn load_task(&self, run_id: &RunId, task_id: &TaskId) -> Result<Task, StoreError> {
        read_json(&self.task_path(run_id, task_id)).await
    }

    async fn save_execution(&self, run_id: &RunId, execution: &Execution) -> Result<(), StoreError> {
        atomic_write_json(&self.execution_path(run_id, &execution.id), execution).await
    }

    async fn load_executions(&self, run_id: &RunId) -> Result<Vec<Execution>, StoreError> {
        read_all_json(&self.executions_dir(run_id)).await
    }
}

// ============================================================================
// SECTION: Atomic Write
// ============================================================================

/// Serializes `value` to `path` via temp-sibling + lockfile + rename.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if `value` cannot be serialized,
/// [`StoreError::Io`] on any filesystem failure, and
/// [`StoreError::LockTimeout`] if the lockfile cannot be acquired before
/// [`LOCK_RETRY_CEILING`] elapses.
pub async fn atomic_write_json<T: serde::Serialize + Sync>(path: &Path, value: &T) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Io(format!("{} has no parent directory", path.display())));
    };
    fs::create_dir_all(parent).await.map_err(|source| StoreError::Io(source.to_string()))?;

    let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization(source.to_string()))?;

    let epoch = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    #[allow(clippy::unwrap_used, reason = "thread_rng never panics producing a bounded u32")]
    let nonce: u32 = rand::thread_rng().gen();
    let temp_path = path.with_extension(format!("tmp.{epoch}.{nonce:x}"));
    fs::write(&temp_path, &body).await.map_err(|source| StoreError::Io(source.to_string()))?;

    let lock_path = lock_path_for(path);
    acquire_lock(&lock_path).await?;

    let rename_result = fs::rename(&temp_path, path).await;
    release_lock(&lock_path).await;

    rename_result.map_err(|source| StoreError::Io(source.to_string()))
}

/// Reads and deserializes the JSON file at `path`.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let body = fs::read(path).await.map_err(|source| StoreError::Io(source.to_string()))?;
    serde_json::from_slice(&body).map_err(|source| StoreError::Serialization(source.to_string()))
}

/// Reads and deserializes every `*.json` file directly under `dir`, skipping
/// the directory entirely (treated as empty) if it does not exist.
async fn read_all_json<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(StoreError::Io(source.to_string())),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io(source.to_string()))? {
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("json") {
            continue;
        }
        items.push(read_json(&path).await?);
    }
    Ok(items)
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Acquires `lock_path`, retrying with [`LOCK_RETRY_BACKOFF`] until
/// [`LOCK_RETRY_CEILING`] elapses. A lockfile older than
/// `STALE_LOCK_MULTIPLIER * LOCK_RETRY_CEILING` is treated as abandoned and
/// cleared before the next attempt.
async fn acquire_lock(lock_path: &Path) -> Result<(), StoreError> {
    let deadline = tokio::time::Instant::now() + LOCK_RETRY_CEILING;
    let pid = std::process::id().to_string();

    loop {
        match fs::OpenOptions::new().write(true).create_new(true).open(lock_path).await {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                let _ = file.write_all(pid.as_bytes()).await;
                return Ok(());
            }
            Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                clear_stale_lock(lock_path).await;
            }
            Err(source) => return Err(StoreError::Io(source.to_string())),
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(StoreError::LockTimeout { path: lock_path.display().to_string() });
        }
        sleep(LOCK_RETRY_BACKOFF).await;
    }
}

async fn clear_stale_lock(lock_path: &Path) {
    let Ok(metadata) = fs::metadata(lock_path).await else { return };
    let Ok(modified) = metadata.modified() else { return };
    let Ok(age) = SystemTime::now().duration_since(modified) else { return };
    if age >= LOCK_RETRY_CEILING * STALE_LOCK_MULTIPLIER {
        let _ = fs::remove_file(lock_path).await;
    }
}

async fn release_lock(lock_path: &Path) {
    let _ = fs::remove_file(lock_path).await;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

    use milhouse_core::RunId;
    use milhouse_core::Timestamp;
    use tempfile::tempdir;

    use super::FsRunStateStore;
    use super::RunStateStore;

    #[tokio::test]
    async fn save_and_load_round_trips_a_run() {
        let dir = tempdir().expect("create tempdir");
        let store = FsRunStateStore::new(dir.path());
        let run_id = RunId::new("run-20260101-000000-abcd");
        let run = milhouse_core::Run::new(run_id.clone(), Some("backend".to_owned()), None, Timestamp::now());

        store.save_run(&run).await.expect("save run");
        let loaded = store.load_run(&run_id).await.expect("load run");
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.scope, run.scope);
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let dir = tempdir().expect("create tempdir");
        let store = FsRunStateStore::new(dir.path());
        let run_id = RunId::new("run-20260101-000000-ffff");
        let error = store.load_run(&run_id).await.expect_err("run does not exist");
        assert!(matches!(error, super::StoreError::Io(_)));
    }
}
