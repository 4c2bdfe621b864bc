//! User accounts and login.
//!
//! # Invariants
//! - Usernames are unique; collisions report `Conflict`.
//! - The system never drops to zero admins through update or delete.
//! - Nobody deletes their own account.
//! - Wrong username and wrong password produce the same error.

use crate::auth::password::PasswordHasher;
use crate::auth::Session;
use crate::error::{AppError, AppResult};
use crate::model::page::{Page, PageRequest};
use crate::model::user::{
    normalize_username, validate_password, NewUser, RoleKind, User, UserId,
};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::sync::Arc;

const INVALID_CREDENTIALS_MESSAGE: &str = "invalid username or password";
pub const SESSION_EXPIRED_MESSAGE: &str = "session is no longer valid, please log in again";

/// Partial update; `None` and empty strings leave a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<RoleKind>,
}

pub struct UserService<U: UserRepository> {
    users: U,
    hasher: Arc<dyn PasswordHasher>,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(users: U, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    pub fn create(&self, username: &str, password: &str, role: RoleKind) -> AppResult<User> {
        let username = normalize_username(username)?;
        validate_password(password)?;

        let new = NewUser {
            username: username.clone(),
            password_hash: self.hasher.hash(password)?,
            role,
        };
        let id = self
            .users
            .create_user(&new)
            .map_err(|err| username_conflict(err, &username))?;

        info!("event=user_create module=service status=ok user_id={id} role={role}");
        Ok(User {
            id,
            username: new.username,
            password_hash: new.password_hash,
            role,
        })
    }

    /// Creates the first admin; refuses once any admin exists.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> AppResult<User> {
        if self.users.count_admins()? > 0 {
            return Err(AppError::Conflict(
                "an administrator already exists".to_string(),
            ));
        }
        self.create(username, password, RoleKind::Admin)
    }

    pub fn get(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.users.get_user(id)?)
    }

    /// Like [`UserService::get`] but reports absence as `NotFound`.
    pub fn require(&self, id: UserId) -> AppResult<User> {
        self.users
            .get_user(id)?
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let username = normalize_username(username)?;
        Ok(self.users.find_by_username(&username)?)
    }

    pub fn list(&self, page: PageRequest) -> AppResult<Page<User>> {
        let total = self.users.count_users()?;
        let items = self.users.list_users(page.offset(), page.per_page())?;
        Ok(Page::new(items, page, total))
    }

    pub fn update(&self, id: UserId, update: UserUpdate) -> AppResult<User> {
        let mut user = self.require(id)?;

        if let Some(username) = update.username.as_deref().filter(|v| !v.trim().is_empty()) {
            user.username = normalize_username(username)?;
        }
        if let Some(password) = update.password.as_deref().filter(|v| !v.is_empty()) {
            user.password_hash = self.hasher.hash(password)?;
        }
        if let Some(role) = update.role {
            if user.role == RoleKind::Admin && role != RoleKind::Admin && self.is_last_admin(id)? {
                return Err(AppError::Conflict(
                    "cannot demote the only administrator".to_string(),
                ));
            }
            user.role = role;
        }

        self.users
            .update_user(&user)
            .map_err(|err| username_conflict(err, &user.username))?;
        info!("event=user_update module=service status=ok user_id={id}");
        Ok(user)
    }

    /// Deletes `id` on behalf of `acting_user`.
    pub fn delete(&self, id: UserId, acting_user: UserId) -> AppResult<()> {
        if id == acting_user {
            return Err(AppError::Conflict(
                "you cannot delete your own account while logged in".to_string(),
            ));
        }
        self.require(id)?;
        if self.is_last_admin(id)? {
            return Err(AppError::Conflict(
                "cannot delete the only administrator".to_string(),
            ));
        }
        self.users.delete_user(id)?;
        info!("event=user_delete module=service status=ok user_id={id}");
        Ok(())
    }

    pub fn count_admins(&self) -> AppResult<u64> {
        Ok(self.users.count_admins()?)
    }

    /// Whether `id` is an admin and the only one.
    pub fn is_last_admin(&self, id: UserId) -> AppResult<bool> {
        match self.users.get_user(id)? {
            Some(user) if user.is_admin() => Ok(self.users.count_admins()? == 1),
            _ => Ok(false),
        }
    }

    /// Checks credentials and mints a session.
    pub fn authenticate(&self, username: &str, password: &str) -> AppResult<Session> {
        let user = match normalize_username(username) {
            Ok(username) => self.users.find_by_username(&username)?,
            Err(_) => None,
        };
        match user {
            Some(user) if self.hasher.verify(password, &user.password_hash) => {
                info!("event=login module=service status=ok user_id={}", user.id);
                Ok(Session::for_user(&user))
            }
            _ => {
                warn!("event=login module=service status=rejected");
                Err(AppError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string()))
            }
        }
    }

    /// Rebuilds `session` from the stored account so a renamed, demoted or
    /// deleted user is seen as they are now.
    pub fn refresh_session(&self, session: &Session) -> AppResult<Session> {
        match self.users.get_user(session.user_id())? {
            Some(user) => Ok(Session::for_user(&user)),
            None => {
                warn!(
                    "event=session_refresh module=service status=rejected user_id={}",
                    session.user_id()
                );
                Err(AppError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string()))
            }
        }
    }
}

fn username_conflict(err: RepoError, username: &str) -> AppError {
    match err {
        RepoError::Duplicate { .. } => {
            AppError::Conflict(format!("username `{username}` is already taken"))
        }
        other => other.into(),
    }
}
