//! Attendance record model.
//!
//! # Invariants
//! - At most one record exists per `(user_id, date)`.
//! - Records are immutable once persisted; only deletion is allowed.

use crate::model::user::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Store-assigned attendance identifier.
pub type AttendanceId = i64;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// One persisted daily attendance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub user_id: UserId,
    /// Calendar day the attendance counts for.
    pub date: NaiveDate,
    /// Unix seconds when the entry was written.
    pub recorded_at: i64,
}

impl AttendanceRecord {
    /// `recorded_at` as a UTC datetime, if representable.
    pub fn recorded_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.recorded_at, 0)
    }
}

/// Insert model for the ledger; the store assigns the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAttendance {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub recorded_at: i64,
}

/// Listing filter. All bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub user_id: Option<UserId>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl AttendanceFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Builds a date range from raw user input.
    ///
    /// Unparseable values are dropped instead of rejected, so a mistyped
    /// bound widens the listing rather than failing it.
    pub fn with_raw_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start = start.and_then(parse_filter_date);
        self.end = end.and_then(parse_filter_date);
        self
    }
}

/// Parses `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_filter_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
