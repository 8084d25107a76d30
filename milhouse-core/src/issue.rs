// milhouse-core/src/issue.rs
// ============================================================================
// Module: Milhouse Issue Entity
// Description: Candidate problems produced by scan and refined by validate.
// Purpose: Define the Issue entity and its severity/status vocabularies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Issues are produced `UNVALIDATED` by the scan phase and refined to a
//! terminal status by the validate phase; the plan phase later attaches the
//! task ids it derives from each issue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::TaskId;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Issue severity, ordered `Low < Medium < High < Critical` for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Lowest scheduling priority.
    Low,
    /// Below-default priority.
    Medium,
    /// Above-default priority.
    High,
    /// Highest scheduling priority.
    Critical,
}

impl Severity {
    /// Parses a severity value, falling back to [`Severity::Medium`] for any
    /// value the AI scanner supplied that does not match a known variant.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "LOW" => Self::Low,
            _ => Self::Medium,
        }
    }
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Terminal (or pre-terminal) validation status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueStatus {
    /// Produced by scan; not yet examined by validate.
    Unvalidated,
    /// Validate confirmed the issue is real.
    Confirmed,
    /// Validate determined the issue does not reproduce.
    False,
    /// Validate confirmed part of the issue but not all of it.
    Partial,
    /// Validate determined the symptom has a different root cause.
    Misdiagnosed,
}

// ============================================================================
// SECTION: Issue
// ============================================================================

/// A candidate problem discovered by the scanner and refined by the
/// validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Unique issue identifier, `P-<base36-timestamp>-<6-hex>`.
    pub id: crate::ids::IssueId,
    /// Observed symptom, as reported by the scanner.
    pub symptom: String,
    /// The scanner's hypothesis for the root cause.
    pub hypothesis: String,
    /// Severity bucket; defaults to [`Severity::Medium`] on invalid input.
    pub severity: Severity,
    /// Optional estimate of how often the symptom occurs.
    pub frequency: Option<String>,
    /// Optional estimate of how much of the system is affected.
    pub blast_radius: Option<String>,
    /// Optional remediation strategy sketch.
    pub strategy: Option<String>,
    /// Current validation status.
    pub status: IssueStatus,
    /// Evidence strings appended by validate.
    pub evidence: Vec<String>,
    /// Task ids derived from this issue by the plan phase.
    pub related_task_ids: Vec<TaskId>,
}

impl Issue {
    /// Creates a new, unvalidated issue as produced by the scan phase.
    #[must_use]
    pub fn new_unvalidated(
        id: crate::ids::IssueId,
        symptom: impl Into<String>,
        hypothesis: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id,
            symptom: symptom.into(),
            hypothesis: hypothesis.into(),
            severity,
            frequency: None,
            blast_radius: None,
            strategy: None,
            status: IssueStatus::Unvalidated,
            evidence: Vec::new(),
            related_task_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Severity;

    #[test]
    fn unknown_severity_falls_back_to_medium() {
        assert_eq!(Severity::parse_lenient("catastrophic"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("critical"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::High);
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
