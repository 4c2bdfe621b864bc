//! Request boundary for user-facing surfaces.
//!
//! # Responsibility
//! - Run the authorization guard before every use-case.
//! - Convert `AppError` into a response envelope with a safe message.
//!
//! # Invariants
//! - Handlers never panic and never return `Err`; failures travel inside
//!   `ActionResponse`.
//! - Internal errors are logged with detail and surfaced only as
//!   `GENERIC_FAILURE_MESSAGE`.
//! - Token verification failures are reported with one message, whatever
//!   the underlying reason.

use crate::app::App;
use crate::auth::{authorize, Capability, Session};
use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceFilter, AttendanceId, AttendanceRecord};
use crate::model::page::{Page, PageRequest};
use crate::model::user::{parse_role, User, UserId};
use crate::service::attendance_service::RECENT_DEFAULT_LIMIT;
use crate::service::qr_service::QrCodeData;
use crate::service::user_service::UserUpdate;
use log::{error, info};
use serde::Serialize;

pub const INVALID_TOKEN_MESSAGE: &str = "invalid or expired QR token, request a new code";

/// Uniform handler result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    /// Human-readable outcome, safe to display.
    pub message: String,
}

impl<T> ActionResponse<T> {
    fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            message: message.into(),
        }
    }
}

/// Raw listing parameters as they arrive from a form or command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AttendanceQuery {
    fn filter(&self) -> AttendanceFilter {
        AttendanceFilter::default().with_raw_range(self.start.as_deref(), self.end.as_deref())
    }

    fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// Authorizes against the caller's stored account as well as the role the
/// session was minted with. Both must allow `capability`; a deleted user is
/// rejected.
fn guard(app: &App, session: Option<&Session>, capability: Capability) -> AppResult<Session> {
    let claimed = authorize(session, capability)?;
    let current = app.users().refresh_session(claimed)?;
    authorize(Some(&current), capability)?;
    Ok(current)
}

fn respond<T>(operation: &'static str, result: AppResult<(T, String)>) -> ActionResponse<T> {
    match result {
        Ok((data, message)) => ActionResponse::success(data, message),
        Err(err) => {
            if err.is_internal() {
                error!(
                    "event={operation} module=api status=error error_code={} error={err}",
                    err.code()
                );
            } else {
                info!(
                    "event={operation} module=api status=rejected error_code={}",
                    err.code()
                );
            }
            ActionResponse::failure(err.user_message())
        }
    }
}

pub fn login(app: &App, username: &str, password: &str) -> ActionResponse<Session> {
    respond(
        "login",
        app.users().authenticate(username, password).map(|session| {
            let message = format!("welcome, {}", session.username());
            (session, message)
        }),
    )
}

/// Fresh personal QR code for the caller.
pub fn my_qr(app: &App, session: Option<&Session>) -> ActionResponse<QrCodeData> {
    let result = guard(app, session, Capability::ViewOwnQr).and_then(|session| {
        let data = app.qr().create_qr(session.user_id())?;
        Ok((data, "scan this code to record attendance".to_string()))
    });
    respond("my_qr", result)
}

pub fn my_attendance(
    app: &App,
    session: Option<&Session>,
    query: &AttendanceQuery,
) -> ActionResponse<Page<AttendanceRecord>> {
    let result = guard(app, session, Capability::ViewOwnAttendance).and_then(|session| {
        let page = app.attendance().user_history(
            session.user_id(),
            &query.filter(),
            query.page_request(),
        )?;
        let message = format!("{} attendance records", page.total);
        Ok((page, message))
    });
    respond("my_attendance", result)
}

pub fn export_my_attendance_csv(
    app: &App,
    session: Option<&Session>,
    query: &AttendanceQuery,
) -> ActionResponse<String> {
    let result = guard(app, session, Capability::ViewOwnAttendance).and_then(|session| {
        let filter = AttendanceFilter {
            user_id: Some(session.user_id()),
            ..query.filter()
        };
        let csv = app.attendance().export_csv(&filter)?;
        Ok((csv, "attendance.csv".to_string()))
    });
    respond("export_my_attendance", result)
}

/// Lets the caller change their own username and/or password.
pub fn update_profile(
    app: &App,
    session: Option<&Session>,
    username: Option<&str>,
    password: Option<&str>,
) -> ActionResponse<User> {
    let result = guard(app, session, Capability::UpdateOwnProfile).and_then(|session| {
        let update = UserUpdate {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            role: None,
        };
        let user = app.users().update(session.user_id(), update)?;
        Ok((user, "profile updated".to_string()))
    });
    respond("update_profile", result)
}

/// Admin scan: verify a token and record today's attendance for its owner.
pub fn scan_attendance(
    app: &App,
    session: Option<&Session>,
    token: &str,
) -> ActionResponse<AttendanceRecord> {
    let result = guard(app, session, Capability::RecordAttendance).and_then(|_| {
        let user_id = app
            .qr()
            .validate(token)
            .ok_or_else(|| AppError::InvalidInput(INVALID_TOKEN_MESSAGE.to_string()))?;
        let user = app
            .users()
            .get(user_id)?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
        let record = app.attendance().record(user.id, None)?;
        Ok((record, format!("attendance recorded for {}", user.username)))
    });
    respond("scan_attendance", result)
}

/// Most recent records for the scanner screen.
pub fn recent_attendance(
    app: &App,
    session: Option<&Session>,
) -> ActionResponse<Vec<AttendanceRecord>> {
    let result = guard(app, session, Capability::ViewAllAttendance).and_then(|_| {
        let records = app.attendance().recent(RECENT_DEFAULT_LIMIT)?;
        let message = format!("{} recent records", records.len());
        Ok((records, message))
    });
    respond("recent_attendance", result)
}

pub fn list_attendance(
    app: &App,
    session: Option<&Session>,
    query: &AttendanceQuery,
) -> ActionResponse<Page<AttendanceRecord>> {
    let result = guard(app, session, Capability::ViewAllAttendance).and_then(|_| {
        let page = app
            .attendance()
            .list(&query.filter(), query.page_request())?;
        let message = format!("{} attendance records", page.total);
        Ok((page, message))
    });
    respond("list_attendance", result)
}

pub fn export_attendance_csv(
    app: &App,
    session: Option<&Session>,
    query: &AttendanceQuery,
) -> ActionResponse<String> {
    let result = guard(app, session, Capability::ViewAllAttendance).and_then(|_| {
        let csv = app.attendance().export_csv(&query.filter())?;
        Ok((csv, "attendances.csv".to_string()))
    });
    respond("export_attendance", result)
}

pub fn delete_attendance(
    app: &App,
    session: Option<&Session>,
    attendance_id: AttendanceId,
) -> ActionResponse<AttendanceId> {
    let result = guard(app, session, Capability::DeleteAttendance).and_then(|_| {
        app.attendance().delete(attendance_id)?;
        Ok((attendance_id, "attendance record deleted".to_string()))
    });
    respond("delete_attendance", result)
}

/// Always rejected once authorized; attendance is immutable.
pub fn update_attendance(
    app: &App,
    session: Option<&Session>,
    attendance_id: AttendanceId,
) -> ActionResponse<AttendanceRecord> {
    let result = guard(app, session, Capability::RecordAttendance)
        .and_then(|_| app.attendance().update(attendance_id, None))
        .map(|record| (record, String::new()));
    respond("update_attendance", result)
}

pub fn list_users(
    app: &App,
    session: Option<&Session>,
    page: Option<u32>,
    per_page: Option<u32>,
) -> ActionResponse<Page<User>> {
    let result = guard(app, session, Capability::ManageUsers).and_then(|_| {
        let page = app.users().list(PageRequest::new(page, per_page))?;
        let message = format!("{} users", page.total);
        Ok((page, message))
    });
    respond("list_users", result)
}

pub fn add_user(
    app: &App,
    session: Option<&Session>,
    username: &str,
    password: &str,
    role: &str,
) -> ActionResponse<User> {
    let result = guard(app, session, Capability::ManageUsers).and_then(|_| {
        let role = parse_role(role)?;
        let user = app.users().create(username, password, role)?;
        let message = format!("user `{}` created as {}", user.username, user.role);
        Ok((user, message))
    });
    respond("add_user", result)
}

pub fn edit_user(
    app: &App,
    session: Option<&Session>,
    user_id: UserId,
    username: Option<&str>,
    password: Option<&str>,
    role: Option<&str>,
) -> ActionResponse<User> {
    let result = guard(app, session, Capability::ManageUsers).and_then(|_| {
        let role = role
            .filter(|value| !value.trim().is_empty())
            .map(parse_role)
            .transpose()?;
        let update = UserUpdate {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            role,
        };
        let user = app.users().update(user_id, update)?;
        let message = format!("user `{}` updated", user.username);
        Ok((user, message))
    });
    respond("edit_user", result)
}

pub fn delete_user(
    app: &App,
    session: Option<&Session>,
    user_id: UserId,
) -> ActionResponse<UserId> {
    let result = guard(app, session, Capability::ManageUsers).and_then(|session| {
        app.users().delete(user_id, session.user_id())?;
        Ok((user_id, "user deleted".to_string()))
    });
    respond("delete_user", result)
}
