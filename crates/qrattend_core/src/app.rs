//! Application context built once at startup.
//!
//! `App` owns the connection and the injected collaborators (clock, password
//! hasher, QR renderer). Handlers receive `&App` and borrow short-lived
//! services from it; there are no process-global service instances.

use crate::auth::password::{Argon2Hasher, PasswordHasher};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db::{open_db, DbError};
use crate::render::{QrRenderer, SvgQrRenderer};
use crate::repo::attendance_repo::SqliteAttendanceRepository;
use crate::repo::user_repo::SqliteUserRepository;
use crate::service::attendance_service::AttendanceService;
use crate::service::qr_service::QrService;
use crate::service::user_service::UserService;
use crate::token::{TokenError, TokenSigner};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum StartupError {
    Token(TokenError),
    Db(DbError),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(err) => write!(f, "invalid token settings: {err}"),
            Self::Db(err) => write!(f, "failed to open database: {err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Token(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<TokenError> for StartupError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

impl From<DbError> for StartupError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

pub struct App {
    conn: Connection,
    clock: Arc<dyn Clock>,
    hasher: Arc<dyn PasswordHasher>,
    qr: QrService,
}

impl App {
    /// Wires an app from explicit parts.
    pub fn new(
        conn: Connection,
        signer: TokenSigner,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn PasswordHasher>,
        renderer: Arc<dyn QrRenderer>,
    ) -> Self {
        let qr = QrService::new(signer, renderer, Arc::clone(&clock));
        Self {
            conn,
            clock,
            hasher,
            qr,
        }
    }

    /// Opens the configured database with production collaborators and
    /// SVG QR output.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        Self::from_config_with_renderer(config, Arc::new(SvgQrRenderer))
    }

    pub fn from_config_with_renderer(
        config: &AppConfig,
        renderer: Arc<dyn QrRenderer>,
    ) -> Result<Self, StartupError> {
        let signer = config.token_signer()?;
        let conn = open_db(&config.database_path)?;
        Ok(Self::new(
            conn,
            signer,
            Arc::new(SystemClock),
            Arc::new(Argon2Hasher::new()),
            renderer,
        ))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn qr(&self) -> &QrService {
        &self.qr
    }

    pub fn users(&self) -> UserService<SqliteUserRepository<'_>> {
        UserService::new(SqliteUserRepository::new(&self.conn), Arc::clone(&self.hasher))
    }

    pub fn attendance(
        &self,
    ) -> AttendanceService<SqliteAttendanceRepository<'_>, SqliteUserRepository<'_>> {
        AttendanceService::new(
            SqliteAttendanceRepository::new(&self.conn),
            SqliteUserRepository::new(&self.conn),
            Arc::clone(&self.clock),
        )
    }
}
