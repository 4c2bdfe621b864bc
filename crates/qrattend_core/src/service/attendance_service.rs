//! Attendance ledger rule.
//!
//! # Responsibility
//! - Record at most one attendance entry per user per calendar day.
//! - Serve history listings and CSV export.
//!
//! # Invariants
//! - The existence check before insert only produces a friendlier error;
//!   the schema's unique constraint decides races, and a lost race reports
//!   the same `Conflict`.
//! - Records are never updated.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceFilter, AttendanceId, AttendanceRecord, NewAttendance};
use crate::model::page::{Page, PageRequest};
use crate::model::user::UserId;
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use chrono::{NaiveDate, SecondsFormat};
use log::{info, warn};
use std::sync::Arc;

pub const DUPLICATE_ATTENDANCE_MESSAGE: &str =
    "attendance already recorded for this user on that date";
pub const RECENT_DEFAULT_LIMIT: u32 = 10;
const CSV_HEADER: &str = "user_id,date,timestamp";

pub struct AttendanceService<A: AttendanceRepository, U: UserRepository> {
    attendance: A,
    users: U,
    clock: Arc<dyn Clock>,
}

impl<A: AttendanceRepository, U: UserRepository> AttendanceService<A, U> {
    pub fn new(attendance: A, users: U, clock: Arc<dyn Clock>) -> Self {
        Self {
            attendance,
            users,
            clock,
        }
    }

    /// Records attendance for `user_id` on `date` (today when `None`).
    ///
    /// # Errors
    /// - `InvalidInput` for a non-positive id.
    /// - `NotFound` when no such user exists.
    /// - `Conflict` when the user already has a record for that date.
    pub fn record(&self, user_id: UserId, date: Option<NaiveDate>) -> AppResult<AttendanceRecord> {
        if user_id <= 0 {
            return Err(AppError::InvalidInput(
                "user id must be a positive integer".to_string(),
            ));
        }
        if self.users.get_user(user_id)?.is_none() {
            return Err(AppError::NotFound(format!("unknown user {user_id}")));
        }

        let date = date.unwrap_or_else(|| self.clock.today());
        if self.attendance.find_for_user_on_date(user_id, date)?.is_some() {
            warn!("event=attendance_record module=service status=duplicate user_id={user_id} date={date}");
            return Err(AppError::Conflict(DUPLICATE_ATTENDANCE_MESSAGE.to_string()));
        }

        let new = NewAttendance {
            user_id,
            date,
            recorded_at: self.clock.now_unix(),
        };
        let id = match self.attendance.insert_attendance(&new) {
            Ok(id) => id,
            Err(RepoError::Duplicate { .. }) => {
                warn!("event=attendance_record module=service status=duplicate_race user_id={user_id} date={date}");
                return Err(AppError::Conflict(DUPLICATE_ATTENDANCE_MESSAGE.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        info!("event=attendance_record module=service status=ok attendance_id={id} user_id={user_id} date={date}");
        Ok(AttendanceRecord {
            id,
            user_id: new.user_id,
            date: new.date,
            recorded_at: new.recorded_at,
        })
    }

    /// Always fails: attendance history is immutable.
    pub fn update(&self, id: AttendanceId, _date: Option<NaiveDate>) -> AppResult<AttendanceRecord> {
        warn!("event=attendance_update module=service status=rejected attendance_id={id}");
        Err(AppError::Unsupported(
            "attendance records cannot be updated".to_string(),
        ))
    }

    /// Removes one record.
    pub fn delete(&self, id: AttendanceId) -> AppResult<()> {
        self.attendance.delete_attendance(id)?;
        info!("event=attendance_delete module=service status=ok attendance_id={id}");
        Ok(())
    }

    pub fn get(&self, id: AttendanceId) -> AppResult<Option<AttendanceRecord>> {
        Ok(self.attendance.get_attendance(id)?)
    }

    pub fn find_for_user_on_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> AppResult<Option<AttendanceRecord>> {
        if user_id <= 0 {
            return Err(AppError::InvalidInput(
                "user id must be a positive integer".to_string(),
            ));
        }
        Ok(self.attendance.find_for_user_on_date(user_id, date)?)
    }

    /// Paginated listing, newest day first.
    pub fn list(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> AppResult<Page<AttendanceRecord>> {
        let total = self.attendance.count_attendance(filter)?;
        let items = self
            .attendance
            .list_attendance(filter, page.offset(), Some(page.per_page()))?;
        Ok(Page::new(items, page, total))
    }

    /// Paginated history for one user.
    pub fn user_history(
        &self,
        user_id: UserId,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> AppResult<Page<AttendanceRecord>> {
        let filter = AttendanceFilter {
            user_id: Some(user_id),
            ..*filter
        };
        self.list(&filter, page)
    }

    /// Latest records across all users, for the scanner screen.
    pub fn recent(&self, limit: u32) -> AppResult<Vec<AttendanceRecord>> {
        Ok(self
            .attendance
            .list_attendance(&AttendanceFilter::default(), 0, Some(limit))?)
    }

    /// Every matching record as CSV, with a `user_id,date,timestamp` header.
    pub fn export_csv(&self, filter: &AttendanceFilter) -> AppResult<String> {
        let records = self.attendance.list_attendance(filter, 0, None)?;
        let mut csv = String::with_capacity(CSV_HEADER.len() + 2 + records.len() * 48);
        csv.push_str(CSV_HEADER);
        csv.push_str("\r\n");
        for record in &records {
            let timestamp = record
                .recorded_at_utc()
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();
            csv.push_str(&format!(
                "{},{},{timestamp}\r\n",
                record.user_id, record.date
            ));
        }
        Ok(csv)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceService, DUPLICATE_ATTENDANCE_MESSAGE};
    use crate::clock::FixedClock;
    use crate::db::open_db_in_memory;
    use crate::error::AppError;
    use crate::model::attendance::{
        AttendanceFilter, AttendanceId, AttendanceRecord, NewAttendance,
    };
    use crate::model::user::{NewUser, RoleKind, UserId};
    use crate::repo::attendance_repo::AttendanceRepository;
    use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
    use crate::repo::{RepoError, RepoResult};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::cell::RefCell;
    use std::sync::Arc;

    /// Ledger whose existence check never sees a row and whose insert
    /// either succeeds or loses to a concurrent writer.
    struct StubLedger {
        lose_race: bool,
        inserted: RefCell<Vec<NewAttendance>>,
    }

    impl StubLedger {
        fn new(lose_race: bool) -> Self {
            Self {
                lose_race,
                inserted: RefCell::new(Vec::new()),
            }
        }
    }

    impl AttendanceRepository for &StubLedger {
        fn insert_attendance(&self, attendance: &NewAttendance) -> RepoResult<AttendanceId> {
            if self.lose_race {
                return Err(RepoError::Duplicate {
                    entity: "attendance",
                });
            }
            self.inserted.borrow_mut().push(*attendance);
            Ok(1)
        }

        fn get_attendance(&self, _id: AttendanceId) -> RepoResult<Option<AttendanceRecord>> {
            Ok(None)
        }

        fn find_for_user_on_date(
            &self,
            _user_id: UserId,
            _date: NaiveDate,
        ) -> RepoResult<Option<AttendanceRecord>> {
            Ok(None)
        }

        fn list_attendance(
            &self,
            _filter: &AttendanceFilter,
            _offset: u64,
            _limit: Option<u32>,
        ) -> RepoResult<Vec<AttendanceRecord>> {
            Ok(Vec::new())
        }

        fn count_attendance(&self, _filter: &AttendanceFilter) -> RepoResult<u64> {
            Ok(0)
        }

        fn delete_attendance(&self, id: AttendanceId) -> RepoResult<()> {
            Err(RepoError::NotFound {
                entity: "attendance record",
                id,
            })
        }
    }

    fn seed_user(conn: &Connection) -> UserId {
        SqliteUserRepository::new(conn)
            .create_user(&NewUser {
                username: "ana".to_string(),
                password_hash: "hash".to_string(),
                role: RoleKind::User,
            })
            .unwrap()
    }

    #[test]
    fn duplicate_from_insert_after_clean_check_is_conflict() {
        let conn = open_db_in_memory().unwrap();
        let user = seed_user(&conn);
        let ledger = StubLedger::new(true);
        let service = AttendanceService::new(
            &ledger,
            SqliteUserRepository::new(&conn),
            Arc::new(FixedClock::at(1_704_110_400)),
        );

        let err = service.record(user, None).unwrap_err();
        assert!(
            matches!(err, AppError::Conflict(ref message) if message == DUPLICATE_ATTENDANCE_MESSAGE),
            "got {err:?}"
        );
        assert!(ledger.inserted.borrow().is_empty());
    }

    #[test]
    fn default_date_comes_from_clock_calendar_not_timestamp() {
        let conn = open_db_in_memory().unwrap();
        let user = seed_user(&conn);
        let ledger = StubLedger::new(false);
        // 2024-01-01T23:30:00Z, already the 2nd in a timezone east of UTC
        let local_today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let service = AttendanceService::new(
            &ledger,
            SqliteUserRepository::new(&conn),
            Arc::new(FixedClock::with_date(1_704_151_800, local_today)),
        );

        let record = service.record(user, None).unwrap();
        assert_eq!(record.date, local_today);
        assert_eq!(record.recorded_at, 1_704_151_800);
        assert_eq!(ledger.inserted.borrow()[0].date, local_today);
    }
}
