// milhouse-exec/src/audit.rs
// ============================================================================
// Module: Audit Log
// Description: Append-only JSON-lines writer/reader for `audit.jsonl`.
// Purpose: Record every state change and let callers query the history
//          without ever failing on a corrupted line.
// Dependencies: tokio, serde_json, milhouse-core
// ============================================================================

//! ## Overview
//! [`AuditLog::append`] writes one JSON object per line, newline-terminated,
//! opened in append mode so concurrent writers never truncate each other's
//! output (the OS guarantees atomicity of small appends; callers that need
//! stronger guarantees serialize through the same file's lock as
//! [`crate::store`]). [`AuditLog::query`] reads the whole file, skipping and
//! logging any line that fails to parse, then applies [`AuditFilter`] and
//! pagination in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use milhouse_core::AuditEntry;
use milhouse_core::EntityType;
use milhouse_core::Timestamp;
use tokio::fs::OpenOptions;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::StoreError;

// ============================================================================
// SECTION: Audit Log
// ============================================================================

/// Append-only audit log for one run.
pub struct AuditLog {
    /// Path to `<run>/audit.jsonl`.
    path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log at `path`, which need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends `entry` as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the entry cannot be serialized or the file
    /// cannot be opened/written.
    pub async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| StoreError::Io(source.to_string()))?;
        }
        let mut line = serde_json::to_string(entry).map_err(|source| StoreError::Serialization(source.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| StoreError::Io(source.to_string()))?;
        file.write_all(line.as_bytes()).await.map_err(|source| StoreError::Io(source.to_string()))?;
        Ok(())
    }

    /// Reads every well-formed line, applies `filter`, and returns at most
    /// `filter.limit` entries starting at `filter.offset`, newest first.
    ///
    /// Malformed lines are logged via `tracing::warn!` and skipped; a
    /// corrupted audit log never fails a query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only if the file exists but cannot be
    /// read at all; a missing file yields an empty result.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let mut contents = String::new();
        match tokio::fs::File::open(&self.path).await {
            Ok(mut file) => {
                file.read_to_string(&mut contents).await.map_err(|source| StoreError::Io(source.to_string()))?;
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io(source.to_string())),
        }

        let mut entries = Vec::new();
        for (line_number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(source) => {
                    warn!(line = line_number + 1, path = %self.path.display(), error = %source, "skipping corrupted audit line");
                }
            }
        }

        entries.retain(|entry| filter.matches(entry));
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let start = filter.offset.min(entries.len());
        let end = filter.limit.map_or(entries.len(), |limit| entries.len().min(start + limit));
        Ok(entries[start..end].to_vec())
    }
}

// ============================================================================
// SECTION: Query Filter
// ============================================================================

/// Post-read filters and pagination applied by [`AuditLog::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Restrict to entries whose `action` exactly matches.
    pub action: Option<String>,
    /// Restrict to entries of this entity type.
    pub entity_type: Option<EntityType>,
    /// Restrict to entries naming this entity id.
    pub entity_id: Option<String>,
    /// Restrict to entries attributed to this agent.
    pub agent_id: Option<String>,
    /// Restrict to entries at or after this time.
    pub since: Option<Timestamp>,
    /// Restrict to entries at or before this time.
    pub until: Option<Timestamp>,
    /// Skip this many matching entries (after sorting newest-first).
    pub offset: usize,
    /// Return at most this many entries; `None` means unbounded.
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(entity_type) = self.entity_type {
            if entry.entity_type != entity_type {
                return false;
            }
        }
        if let Some(entity_id) = &self.entity_id {
            if &entry.entity_id != entity_id {
                return false;
            }
        }
        if let Some(agent_id) = &self.agent_id {
            if entry.agent_id.as_deref() != Some(agent_id.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// SECTION: Named Action Helpers
// ============================================================================

/// Constructors for the documented audit action namespace, so call sites
/// never hand-type an action string.
pub mod actions {
    use milhouse_core::AuditEntry;
    use milhouse_core::EntityType;
    use milhouse_core::Timestamp;
    use serde_json::Value;

    /// `run:created`.
    #[must_use]
    pub fn run_created(now: Timestamp, run_id: &str) -> AuditEntry {
        AuditEntry::new(now, "run:created", EntityType::Run, run_id)
    }

    /// `run:phase:changed`.
    #[must_use]
    pub fn run_phase_changed(now: Timestamp, run_id: &str, before: &str, after: &str) -> AuditEntry {
        AuditEntry::new(now, "run:phase:changed", EntityType::Run, run_id)
            .with_before_after(Some(Value::String(before.to_owned())), Some(Value::String(after.to_owned())))
    }

    /// `issue:validated`.
    #[must_use]
    pub fn issue_validated(now: Timestamp, issue_id: &str, status: &str) -> AuditEntry {
        AuditEntry::new(now, "issue:validated", EntityType::Issue, issue_id)
            .with_metadata(serde_json::json!({ "status": status }))
    }

    /// `task:status:changed`.
    #[must_use]
    pub fn task_status_changed(now: Timestamp, task_id: &str, agent_id: &str, before: &str, after: &str) -> AuditEntry {
        AuditEntry::new(now, "task:status:changed", EntityType::Task, task_id)
            .with_agent(agent_id)
            .with_before_after(Some(Value::String(before.to_owned())), Some(Value::String(after.to_owned())))
    }

    /// `execution:started`.
    #[must_use]
    pub fn execution_started(now: Timestamp, execution_id: &str, task_id: &str) -> AuditEntry {
        AuditEntry::new(now, "execution:started", EntityType::Execution, execution_id)
            .with_metadata(serde_json::json!({ "task_id": task_id }))
    }

    /// `execution:completed`.
    #[must_use]
    pub fn execution_completed(now: Timestamp, execution_id: &str, commit_sha: Option<&str>) -> AuditEntry {
        AuditEntry::new(now, "execution:completed", EntityType::Execution, execution_id)
            .with_metadata(serde_json::json!({ "commit_sha": commit_sha }))
    }

    /// `execution:failed`.
    #[must_use]
    pub fn execution_failed(now: Timestamp, execution_id: &str, error: &str) -> AuditEntry {
        AuditEntry::new(now, "execution:failed", EntityType::Execution, execution_id)
            .with_metadata(serde_json::json!({ "error": error }))
    }

    /// `state:snapshot:created`.
    #[must_use]
    pub fn state_snapshot_created(now: Timestamp, run_id: &str, snapshot_id: &str) -> AuditEntry {
        AuditEntry::new(now, "state:snapshot:created", EntityType::Run, run_id)
            .with_metadata(serde_json::json!({ "snapshot_id": snapshot_id }))
    }

    /// `state:rollback`.
    #[must_use]
    pub fn state_rollback(now: Timestamp, run_id: &str, snapshot_id: &str) -> AuditEntry {
        AuditEntry::new(now, "state:rollback", EntityType::Run, run_id)
            .with_metadata(serde_json::json!({ "snapshot_id": snapshot_id }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

    use milhouse_core::Timestamp;
    use tempfile::tempdir;

    use super::actions;
    use super::AuditFilter;
    use super::AuditLog;

    #[tokio::test]
    async fn query_skips_corrupted_lines() {
        let dir = tempdir().expect("create tempdir");
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::new(&path);

        log.append(&actions::run_created(Timestamp::from_unix_millis(1_000), "run-a")).await.expect("append first entry");
        tokio::fs::write(&path, format!("{}not json at all\n", tokio::fs::read_to_string(&path).await.unwrap()))
            .await
            .expect("append corrupted line");
        log.append(&actions::run_created(Timestamp::from_unix_millis(2_000), "run-b")).await.expect("append second entry");

        let entries = log.query(&AuditFilter::default()).await.expect("query tolerates corruption");
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn filter_restricts_by_action_and_pagination() {
        let dir = tempdir().expect("create tempdir");
        let log = AuditLog::new(dir.path().join("audit.jsonl"));
        for index in 0..5 {
            log.append(&actions::run_created(Timestamp::from_unix_millis(index * 1000), "run-a")).await.expect("append");
        }

        let filter = AuditFilter { action: Some("run:created".to_owned()), limit: Some(2), ..AuditFilter::default() };
        let entries = log.query(&filter).await.expect("query with filter");
        assert_eq!(entries.len(), 2);
    }
}
