//! Sessions and role capability checks.
//!
//! # Responsibility
//! - Map the closed `RoleKind` set onto the capabilities each role holds.
//! - Provide the guard every request handler runs before its use-case.
//!
//! # Invariants
//! - Access is denied by default: a capability not listed for a role is
//!   never granted.
//! - A `Session` is only minted inside this crate from a stored user, so
//!   callers cannot forge one; its fields are read-only.
//! - A session is a claim, not proof of the current role. Handlers reload
//!   the user (see `UserService::refresh_session`) and authorize again.

pub mod password;

use crate::error::AppError;
use crate::model::user::{RoleKind, User, UserId};
use serde::Serialize;

/// Operations a session may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    ViewOwnQr,
    ViewOwnAttendance,
    UpdateOwnProfile,
    RecordAttendance,
    ViewAllAttendance,
    DeleteAttendance,
    ManageUsers,
}

const USER_CAPABILITIES: &[Capability] = &[
    Capability::ViewOwnQr,
    Capability::ViewOwnAttendance,
    Capability::UpdateOwnProfile,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ViewOwnQr,
    Capability::ViewOwnAttendance,
    Capability::UpdateOwnProfile,
    Capability::RecordAttendance,
    Capability::ViewAllAttendance,
    Capability::DeleteAttendance,
    Capability::ManageUsers,
];

impl Capability {
    /// Stable name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewOwnQr => "view_own_qr",
            Self::ViewOwnAttendance => "view_own_attendance",
            Self::UpdateOwnProfile => "update_own_profile",
            Self::RecordAttendance => "record_attendance",
            Self::ViewAllAttendance => "view_all_attendance",
            Self::DeleteAttendance => "delete_attendance",
            Self::ManageUsers => "manage_users",
        }
    }
}

impl RoleKind {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Admin => ADMIN_CAPABILITIES,
            Self::User => USER_CAPABILITIES,
        }
    }

    pub fn allows(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    user_id: UserId,
    username: String,
    role: RoleKind,
}

impl Session {
    pub(crate) fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> RoleKind {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == RoleKind::Admin
    }
}

/// Guard run before entering a handler.
///
/// # Errors
/// - `Unauthorized("login required")` without a session.
/// - `Unauthorized("admin role required")` when the role lacks `capability`.
pub fn authorize(session: Option<&Session>, capability: Capability) -> Result<&Session, AppError> {
    let Some(session) = session else {
        return Err(AppError::Unauthorized("login required".to_string()));
    };
    if !session.role.allows(capability) {
        log::warn!(
            "event=authorize module=auth status=denied user_id={} capability={}",
            session.user_id,
            capability.as_str()
        );
        return Err(AppError::Unauthorized("admin role required".to_string()));
    }
    Ok(session)
}
