//! # Temporal Types — Millisecond Epoch Timestamps
//!
//! Defines `Timestamp`, milliseconds since the Unix epoch in UTC.
//!
//! Block timestamps participate in the block digest, so their wire form must
//! be a single fixed representation: a bare JSON integer. Timestamps are
//! never serialized as strings, which rules out the offset and precision
//! ambiguities of RFC 3339 text inside the digest input. `to_rfc3339()`
//! exists for display only.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC point in time with millisecond precision.
///
/// Serializes as an integer count of milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current wall-clock time, truncated to milliseconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Create a timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating to milliseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimestamp` if the string does not parse.
    pub fn parse_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(dt.with_timezone(&Utc).timestamp_millis()))
    }

    /// Milliseconds since the Unix epoch.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a `chrono::DateTime<Utc>`, or `None` if out of chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }

    /// Render as RFC 3339 with millisecond precision and `Z` suffix
    /// (e.g. `2026-01-15T12:00:00.250Z`). Out-of-range values fall back to
    /// the raw millisecond count.
    pub fn to_rfc3339(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}
