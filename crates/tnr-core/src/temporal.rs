//! # Temporal Types: UTC-Only Timestamps
//!
//! `Timestamp` is a UTC instant truncated to millisecond precision. History
//! rows, invoices, and registry dates all use it so that ordering comparisons
//! never mix offsets.
//!
//! Non-UTC inputs are rejected by [`Timestamp::parse`]; ingestion of external
//! data goes through [`Timestamp::parse_lenient`], which converts to UTC.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Wrap a `DateTime<Utc>`, truncating sub-millisecond components.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        let millis = dt.timestamp_millis();
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: "timestamp must use Z suffix (UTC only)".to_string(),
            });
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Midnight UTC of a calendar date. Registry dates are day-granular.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_utc(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Compact stamp used in human-readable document numbers: `YYYYMMDDHHMMSS`.
    pub fn compact_stamp(&self) -> String {
        self.0.format("%Y%m%d%H%M%S").to_string()
    }

    /// Render as RFC 3339 with `Z` suffix and millisecond precision.
    pub fn to_rfc3339(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// The later of `self` and `floor`.
    ///
    /// The workflow engine stamps history rows with
    /// `Timestamp::now().not_before(last)` so a request's history stays
    /// non-decreasing even if the wall clock steps backwards.
    pub fn not_before(self, floor: Timestamp) -> Timestamp {
        if self < floor {
            floor
        } else {
            self
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
