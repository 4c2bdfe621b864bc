//! Attendance ledger persistence.
//!
//! # Responsibility
//! - Insert, read, list and delete attendance rows.
//! - Surface the schema's `UNIQUE(user_id, date)` guard as
//!   `RepoError::Duplicate`.
//!
//! # Invariants
//! - There is no update path; rows are written once.
//! - Listings are ordered `date DESC, id DESC`.
//! - Dates are stored as ISO `YYYY-MM-DD` text.

use crate::model::attendance::{AttendanceFilter, AttendanceId, AttendanceRecord, NewAttendance};
use crate::model::user::UserId;
use crate::repo::{classify_write_error, to_sql_int, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    date,
    recorded_at
FROM attendances";

const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";

pub trait AttendanceRepository {
    /// Inserts one row. A second row for the same `(user_id, date)` fails
    /// with `RepoError::Duplicate`.
    fn insert_attendance(&self, attendance: &NewAttendance) -> RepoResult<AttendanceId>;
    fn get_attendance(&self, id: AttendanceId) -> RepoResult<Option<AttendanceRecord>>;
    fn find_for_user_on_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>>;
    /// Lists matching rows; `limit = None` returns everything after `offset`.
    fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        offset: u64,
        limit: Option<u32>,
    ) -> RepoResult<Vec<AttendanceRecord>>;
    fn count_attendance(&self, filter: &AttendanceFilter) -> RepoResult<u64>;
    fn delete_attendance(&self, id: AttendanceId) -> RepoResult<()>;
}

/// SQLite-backed attendance repository.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository<'_> {
    fn insert_attendance(&self, attendance: &NewAttendance) -> RepoResult<AttendanceId> {
        self.conn
            .execute(
                "INSERT INTO attendances (user_id, date, recorded_at) VALUES (?1, ?2, ?3);",
                params![
                    attendance.user_id,
                    date_to_db(attendance.date),
                    attendance.recorded_at
                ],
            )
            .map_err(classify_write_error("attendance"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_attendance(&self, id: AttendanceId) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ATTENDANCE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_attendance_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_for_user_on_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL} WHERE user_id = ?1 AND date = ?2;"
        ))?;
        let mut rows = stmt.query(params![user_id, date_to_db(date)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_attendance_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        offset: u64,
        limit: Option<u32>,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        let (where_sql, mut bind_values) = filter_clause(filter);
        let mut sql = format!("{ATTENDANCE_SELECT_SQL}{where_sql} ORDER BY date DESC, id DESC");

        match limit {
            Some(limit) => {
                sql.push_str(" LIMIT ?");
                bind_values.push(Value::Integer(i64::from(limit)));
            }
            None => sql.push_str(" LIMIT -1"),
        }
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(to_sql_int(offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_attendance_row(row)?);
        }
        Ok(records)
    }

    fn count_attendance(&self, filter: &AttendanceFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = filter_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM attendances{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(count.unsigned_abs())
    }

    fn delete_attendance(&self, id: AttendanceId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM attendances WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "attendance record",
                id,
            });
        }
        Ok(())
    }
}

fn filter_clause(filter: &AttendanceFilter) -> (String, Vec<Value>) {
    let mut sql = String::from(" WHERE 1 = 1");
    let mut bind_values = Vec::new();

    if let Some(user_id) = filter.user_id {
        sql.push_str(" AND user_id = ?");
        bind_values.push(Value::Integer(user_id));
    }
    if let Some(start) = filter.start {
        sql.push_str(" AND date >= ?");
        bind_values.push(Value::Text(date_to_db(start)));
    }
    if let Some(end) = filter.end {
        sql.push_str(" AND date <= ?");
        bind_values.push(Value::Text(date_to_db(end)));
    }

    (sql, bind_values)
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let date_text: String = row.get("date")?;
    let date = NaiveDate::parse_from_str(&date_text, DATE_STORAGE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date value `{date_text}` in attendances.date"))
    })?;

    Ok(AttendanceRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date,
        recorded_at: row.get("recorded_at")?,
    })
}

fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_STORAGE_FORMAT).to_string()
}
