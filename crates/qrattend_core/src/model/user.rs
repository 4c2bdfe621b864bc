//! User and role model.
//!
//! # Invariants
//! - `username` is trimmed, non-empty and at most `USERNAME_MAX_CHARS` chars.
//! - Roles form a closed set; persisted names are `Admin` and `User`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned user identifier. Always positive for persisted users.
pub type UserId = i64;

pub const USERNAME_MAX_CHARS: usize = 80;

/// Closed set of role kinds a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Admin,
    User,
}

impl RoleKind {
    /// Persisted role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
        }
    }

    /// Parses a persisted or user-supplied role name.
    ///
    /// Matching is case-insensitive so CLI input like `admin` is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("admin") {
            Some(Self::Admin)
        } else if trimmed.eq_ignore_ascii_case("user") {
            Some(Self::User)
        } else {
            None
        }
    }
}

impl Display for RoleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// PHC-formatted hash; never serialized to callers.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: RoleKind,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == RoleKind::Admin
    }
}

/// Insert model for a new account; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: RoleKind,
}

/// Validation failures for user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyUsername,
    UsernameTooLong { max_chars: usize },
    EmptyPassword,
    UnknownRole(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username is required"),
            Self::UsernameTooLong { max_chars } => {
                write!(f, "username must be at most {max_chars} characters")
            }
            Self::EmptyPassword => write!(f, "password is required"),
            Self::UnknownRole(value) => write!(f, "role `{value}` does not exist"),
        }
    }
}

impl Error for UserValidationError {}

/// Trims and validates a username.
pub fn normalize_username(value: &str) -> Result<String, UserValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UserValidationError::EmptyUsername);
    }
    if trimmed.chars().count() > USERNAME_MAX_CHARS {
        return Err(UserValidationError::UsernameTooLong {
            max_chars: USERNAME_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Rejects empty passwords. Passwords are otherwise taken verbatim.
pub fn validate_password(value: &str) -> Result<(), UserValidationError> {
    if value.is_empty() {
        return Err(UserValidationError::EmptyPassword);
    }
    Ok(())
}

/// Parses a role name or reports it as unknown.
pub fn parse_role(value: &str) -> Result<RoleKind, UserValidationError> {
    RoleKind::parse(value).ok_or_else(|| UserValidationError::UnknownRole(value.trim().to_string()))
}
