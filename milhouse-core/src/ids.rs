// milhouse-core/src/ids.rs
// ============================================================================
// Module: Milhouse Identifiers
// Description: Newtype identifiers for runs, issues, tasks, and executions.
// Purpose: Prevent call sites from transposing identifiers of different kinds.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every entity identifier is a distinct newtype wrapping a `String` rather
//! than a bare `String` passed positionally. Each type also exposes a
//! deterministic-format generator matching the id grammar in the data model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::time::Timestamp;

// ============================================================================
// SECTION: Macro: newtype id boilerplate
// ============================================================================

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", stringify!($name), " from an owned or borrowed string.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(RunId, "Run identifier: `run-YYYYMMDD-HHMMSS-XXXX`.");
string_id!(IssueId, "Issue identifier: `P-<base36-timestamp>-<6-hex>`.");
string_id!(TaskId, "Task identifier: `T-<issue-id-fragment>-<nn>`.");
string_id!(ExecutionId, "Execution identifier: opaque, process-unique.");

// ============================================================================
// SECTION: Identifier Generators
// ============================================================================

impl RunId {
    /// Generates a run id of the form `run-YYYYMMDD-HHMMSS-XXXX`, where
    /// `XXXX` is four lowercase hex characters supplied by the caller (the
    /// core never reads randomness directly; callers in `milhouse-exec`
    /// source it from `rand`).
    #[must_use]
    pub fn generate(now: Timestamp, suffix_hex4: &str) -> Self {
        let odt = now.as_unix_millis();
        let seconds = odt / 1000;
        let (date, time) = split_unix_seconds(seconds);
        Self::new(format!("run-{date}-{time}-{suffix_hex4}"))
    }
}

impl IssueId {
    /// Generates an issue id of the form `P-<base36-timestamp>-<6-hex>`.
    #[must_use]
    pub fn generate(now: Timestamp, suffix_hex6: &str) -> Self {
        let millis = now.as_unix_millis().max(0);
        #[allow(
            clippy::cast_sign_loss,
            reason = "millis is clamped non-negative immediately above"
        )]
        let base36 = to_base36(millis as u64);
        Self::new(format!("P-{base36}-{suffix_hex6}"))
    }
}

impl TaskId {
    /// Generates a task id of the form `T-<issue-id-fragment>-<nn>` where
    /// `nn` is a zero-padded two-digit sequence number within the issue.
    #[must_use]
    pub fn generate(issue: &IssueId, sequence: u32) -> Self {
        let fragment = issue.as_str().trim_start_matches("P-");
        Self::new(format!("T-{fragment}-{sequence:02}"))
    }
}

/// Splits Unix seconds into `(YYYYMMDD, HHMMSS)` using a proleptic Gregorian
/// calendar computation, matching the grammar in the data model without
/// pulling a full calendar dependency into the id module.
fn split_unix_seconds(seconds: i64) -> (String, String) {
    use time::OffsetDateTime;
    let odt = OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let date = format!("{:04}{:02}{:02}", odt.year(), u8::from(odt.month()), odt.day());
    let time = format!("{:02}{:02}{:02}", odt.hour(), odt.minute(), odt.second());
    (date, time)
}

/// Encodes `value` as lowercase base36, matching JavaScript's
/// `Number.prototype.toString(36)` used by the source system for timestamps.
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while value > 0 {
        let digit = usize::try_from(value % 36).unwrap_or(0);
        out.push(DIGITS[digit]);
        value /= 36;
    }
    out.reverse();
    #[allow(
        clippy::unwrap_used,
        reason = "DIGITS is ASCII-only, so the byte vector is always valid UTF-8"
    )]
    String::from_utf8(out).unwrap()
}

// ============================================================================
// SECTION: Agent Role
// ============================================================================

/// Agent role codes tagging who produced a record or invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentRole {
    /// Lead Investigator — drives the scan phase.
    Li,
    /// Issue Validator — drives the validate phase.
    Iv,
    /// Planner — drives the plan phase.
    Pl,
    /// Consolidated Dependency Merger — drives the consolidate phase.
    Cdm,
    /// Executor — drives the exec phase.
    Ex,
    /// Truth Verifier — drives the verify phase.
    Tv,
    /// Release role, invoked outside the six core phases.
    Pr,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Li => "LI",
            Self::Iv => "IV",
            Self::Pl => "PL",
            Self::Cdm => "CDM",
            Self::Ex => "EX",
            Self::Tv => "TV",
            Self::Pr => "PR",
        };
        f.write_str(code)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::IssueId;
    use super::RunId;
    use super::TaskId;
    use crate::time::Timestamp;

    #[test]
    fn run_id_matches_grammar() {
        let id = RunId::generate(Timestamp::from_unix_millis(1_700_000_000_000), "a1b2");
        assert!(id.as_str().starts_with("run-"));
        assert!(id.as_str().ends_with("-a1b2"));
        assert_eq!(id.as_str().len(), "run-YYYYMMDD-HHMMSS-XXXX".len());
    }

    #[test]
    fn task_id_derives_from_issue_fragment() {
        let issue = IssueId::new("P-kf8x2j-ab12cd");
        let task = TaskId::generate(&issue, 3);
        assert_eq!(task.as_str(), "T-kf8x2j-ab12cd-03");
    }
}
