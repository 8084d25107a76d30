// milhouse-core/src/audit.rs
// ============================================================================
// Module: Milhouse Audit Entry
// Description: One JSON-line record of a state change.
// Purpose: Define the audit entry shape shared by every writer and reader of
//          `audit.jsonl`.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit entries are append-only and never rewritten; the log reader in
//! `milhouse-exec` is responsible for skipping corrupted lines rather than
//! repairing them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::time::Timestamp;

// ============================================================================
// SECTION: Entity Type
// ============================================================================

/// The kind of entity an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A run.
    Run,
    /// An issue.
    Issue,
    /// A task.
    Task,
    /// An execution.
    Execution,
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// One append-only record of a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: Timestamp,
    /// Dotted action namespace, e.g. `task:status:changed`.
    pub action: String,
    /// Kind of entity the action concerns.
    pub entity_type: EntityType,
    /// Identifier of the entity, as a plain string.
    pub entity_id: String,
    /// Agent role code that produced the change, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Entity state before the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    /// Entity state after the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    /// Free-form metadata bag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditEntry {
    /// Creates a new audit entry with no optional fields set.
    #[must_use]
    pub fn new(
        timestamp: Timestamp,
        action: impl Into<String>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            action: action.into(),
            entity_type,
            entity_id: entity_id.into(),
            agent_id: None,
            before: None,
            after: None,
            metadata: None,
        }
    }

    /// Attaches the before/after entity snapshots.
    #[must_use]
    pub fn with_before_after(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Attaches an agent role code.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Attaches free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
