//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `username` uniqueness is enforced by the schema; collisions surface as
//!   `RepoError::Duplicate { entity: "username" }`.
//! - Deleting a user cascades to its attendance records.

use crate::model::user::{NewUser, RoleKind, User, UserId};
use crate::repo::role_repo::{parse_role_name, RoleRepository, SqliteRoleRepository};
use crate::repo::{classify_write_error, to_sql_int, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    u.id,
    u.username,
    u.password_hash,
    r.name AS role_name
FROM users u
INNER JOIN roles r ON r.id = u.role_id";

pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn list_users(&self, offset: u64, limit: u32) -> RepoResult<Vec<User>>;
    fn count_users(&self) -> RepoResult<u64>;
    /// Replaces username, password hash and role of an existing user.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
    fn count_admins(&self) -> RepoResult<u64>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn role_id(&self, kind: RoleKind) -> RepoResult<i64> {
        SqliteRoleRepository::new(self.conn).role_id(kind)
    }

    fn query_one(&self, sql: &str, param: &dyn rusqlite::ToSql) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([param])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId> {
        let role_id = self.role_id(user.role)?;
        self.conn
            .execute(
                "INSERT INTO users (username, password_hash, role_id) VALUES (?1, ?2, ?3);",
                params![user.username.as_str(), user.password_hash.as_str(), role_id],
            )
            .map_err(classify_write_error("username"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.query_one(&format!("{USER_SELECT_SQL} WHERE u.id = ?1;"), &id)
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.query_one(&format!("{USER_SELECT_SQL} WHERE u.username = ?1;"), &username)
    }

    fn list_users(&self, offset: u64, limit: u32) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY u.id ASC LIMIT ?1 OFFSET ?2;"))?;
        let mut rows = stmt.query(params![i64::from(limit), to_sql_int(offset)])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn count_users(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?;
        Ok(count.unsigned_abs())
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        let role_id = self.role_id(user.role)?;
        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET username = ?1, password_hash = ?2, role_id = ?3
                 WHERE id = ?4;",
                params![
                    user.username.as_str(),
                    user.password_hash.as_str(),
                    role_id,
                    user.id
                ],
            )
            .map_err(classify_write_error("username"))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn count_admins(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM users u
             INNER JOIN roles r ON r.id = u.role_id
             WHERE r.name = ?1;",
            [RoleKind::Admin.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.unsigned_abs())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_name: String = row.get("role_name")?;
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        role: parse_role_name(&role_name)?,
    })
}
