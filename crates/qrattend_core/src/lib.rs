//! Core domain logic for qrattend.
//! This crate owns the token codec, the daily attendance ledger and the
//! access rules; front-ends only call into `api`.

pub mod api;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;
pub mod service;
pub mod token;

pub use api::{ActionResponse, AttendanceQuery};
pub use app::{App, StartupError};
pub use auth::password::{Argon2Hasher, PasswordHasher};
pub use auth::{authorize, Capability, Session};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{AppError, AppResult, GENERIC_FAILURE_MESSAGE};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::attendance::{AttendanceFilter, AttendanceId, AttendanceRecord};
pub use model::page::{Page, PageRequest};
pub use model::user::{RoleKind, User, UserId};
pub use render::{QrRenderer, RenderError, SvgQrRenderer, TerminalQrRenderer};
pub use repo::{RepoError, RepoResult};
pub use service::attendance_service::AttendanceService;
pub use service::qr_service::{QrCodeData, QrService};
pub use service::user_service::{UserService, UserUpdate};
pub use token::{issue, verify, TokenError, TokenSigner};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
