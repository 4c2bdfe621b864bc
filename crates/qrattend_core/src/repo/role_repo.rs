//! Role lookups.
//!
//! Roles are seeded by migration and never created at runtime; this
//! repository only resolves `RoleKind` to row ids.

use crate::model::user::RoleKind;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension};

pub trait RoleRepository {
    fn role_id(&self, kind: RoleKind) -> RepoResult<i64>;
}

pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RoleRepository for SqliteRoleRepository<'_> {
    fn role_id(&self, kind: RoleKind) -> RepoResult<i64> {
        self.conn
            .query_row(
                "SELECT id FROM roles WHERE name = ?1;",
                [kind.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                RepoError::InvalidData(format!("role `{}` missing from roles table", kind.as_str()))
            })
    }
}

pub(crate) fn parse_role_name(name: &str) -> RepoResult<RoleKind> {
    match name {
        "Admin" => Ok(RoleKind::Admin),
        "User" => Ok(RoleKind::User),
        other => Err(RepoError::InvalidData(format!(
            "invalid role name `{other}` in roles.name"
        ))),
    }
}
