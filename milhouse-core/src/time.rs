// milhouse-core/src/time.rs
// ============================================================================
// Module: Milhouse Time Model
// Description: Canonical RFC 3339 timestamp representation for audit and
//              entity records.
// Purpose: Centralize timestamp parsing/formatting so every persisted record
//          uses the exact same wire representation.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Every persisted milhouse record uses `Timestamp` rather than a bare
//! `String` or `i64` for time values, so RFC 3339-with-milliseconds
//! formatting lives in exactly one place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised parsing or formatting a [`Timestamp`].
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    /// The input string is not a valid RFC 3339 timestamp.
    #[error("invalid RFC 3339 timestamp: {0}")]
    Parse(String),
    /// Formatting the timestamp to RFC 3339 failed.
    #[error("failed to format timestamp: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// An RFC 3339 UTC timestamp with millisecond precision.
///
/// Audit entries, run/issue/task/execution timestamps, and lockfile staleness
/// checks all use this type so that every persisted timestamp round-trips
/// through the same format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Builds a timestamp from the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Builds a timestamp from Unix epoch milliseconds.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Self {
        let nanos = i128::from(millis) * 1_000_000;
        #[allow(
            clippy::unwrap_used,
            reason = "i128 nanoseconds derived from i64 milliseconds never overflows the valid OffsetDateTime range used by this application"
        )]
        Self(OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap())
    }

    /// Returns the timestamp as Unix epoch milliseconds.
    #[must_use]
    pub fn as_unix_millis(&self) -> i64 {
        self.0.unix_timestamp() * 1000 + i64::from(self.0.millisecond())
    }

    /// Parses an RFC 3339 timestamp string.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when `value` is not valid RFC 3339.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(value, &Rfc3339)
            .map(Self)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Formats the timestamp as RFC 3339 with millisecond precision.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Format`] on an internal formatting failure;
    /// this should not occur for any timestamp constructed via this type.
    pub fn to_rfc3339(self) -> Result<String, TimestampError> {
        self.0
            .format(&Rfc3339)
            .map_err(|err| TimestampError::Format(err.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<invalid-timestamp>"),
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_rfc3339().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::Timestamp;

    #[test]
    fn round_trips_through_rfc3339() {
        let original = Timestamp::from_unix_millis(1_700_000_000_123);
        let text = original.to_rfc3339().unwrap();
        let parsed = Timestamp::parse(&text).unwrap();
        assert_eq!(original.as_unix_millis(), parsed.as_unix_millis());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Timestamp::parse("not-a-timestamp").is_err());
    }
}
