//! Use-case error taxonomy.
//!
//! # Invariants
//! - Business-rule failures carry a message safe to show to the caller.
//! - Internal failures (`Storage`, `Internal`) are never shown verbatim; the
//!   boundary logs them and substitutes [`GENERIC_FAILURE_MESSAGE`].

use crate::auth::password::PasswordError;
use crate::model::user::UserValidationError;
use crate::render::RenderError;
use crate::repo::RepoError;
use crate::token::TokenError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const GENERIC_FAILURE_MESSAGE: &str = "internal error, please try again";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Bad shape or type for ids, dates, tokens or credentials.
    InvalidInput(String),
    /// Referenced entity is absent.
    NotFound(String),
    /// Duplicate attendance, duplicate username, or a protected-state rule.
    Conflict(String),
    /// Not logged in, or the role lacks the capability.
    Unauthorized(String),
    /// Operation is never allowed (attendance updates).
    Unsupported(String),
    Storage(RepoError),
    /// QR rendering or password hashing backend failure.
    Internal(String),
}

impl AppError {
    /// Whether this error must be hidden behind a generic message.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }

    /// Message suitable for the end user.
    pub fn user_message(&self) -> String {
        if self.is_internal() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unsupported(_) => "unsupported",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Unauthorized(message)
            | Self::Unsupported(message) => f.write_str(message),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Internal(message) => write!(f, "internal failure: {message}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id} not found")),
            other => Self::Storage(other),
        }
    }
}

impl From<UserValidationError> for AppError {
    fn from(value: UserValidationError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Key(_) => Self::Internal(value.to_string()),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(value: RenderError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(value: PasswordError) -> Self {
        Self::Internal(value.to_string())
    }
}
