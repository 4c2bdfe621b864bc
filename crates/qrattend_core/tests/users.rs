use qrattend_core::db::open_db_in_memory;
use qrattend_core::repo::role_repo::{RoleRepository, SqliteRoleRepository};
use qrattend_core::repo::user_repo::SqliteUserRepository;
use qrattend_core::{AppError, Argon2Hasher, PageRequest, RoleKind, UserService, UserUpdate};
use rusqlite::Connection;
use std::sync::Arc;

fn service(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(
        SqliteUserRepository::new(conn),
        Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()),
    )
}

#[test]
fn create_hashes_password_and_trims_username() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);

    let user = users.create("  ana ", "s3cret", RoleKind::User).unwrap();
    assert_eq!(user.username, "ana");
    assert_ne!(user.password_hash, "s3cret");
    assert!(user.password_hash.starts_with("$argon2id$"));

    let loaded = users.find_by_username("ana").unwrap().unwrap();
    assert_eq!(loaded.id, user.id);
    assert_eq!(loaded.role, RoleKind::User);
}

#[test]
fn duplicate_username_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    users.create("ana", "pw", RoleKind::User).unwrap();

    let err = users.create("ana", "other", RoleKind::Admin).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn create_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);

    assert!(matches!(
        users.create("   ", "pw", RoleKind::User).unwrap_err(),
        AppError::InvalidInput(_)
    ));
    assert!(matches!(
        users.create("ana", "", RoleKind::User).unwrap_err(),
        AppError::InvalidInput(_)
    ));
    assert!(matches!(
        users.create(&"x".repeat(81), "pw", RoleKind::User).unwrap_err(),
        AppError::InvalidInput(_)
    ));
}

#[test]
fn bootstrap_admin_only_once() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);

    let admin = users.bootstrap_admin("root", "pw").unwrap();
    assert!(admin.is_admin());
    assert!(matches!(
        users.bootstrap_admin("root2", "pw").unwrap_err(),
        AppError::Conflict(_)
    ));
}

#[test]
fn authenticate_accepts_right_password_only() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let user = users.create("ana", "pw", RoleKind::Admin).unwrap();

    let session = users.authenticate("ana", "pw").unwrap();
    assert_eq!(session.user_id(), user.id);
    assert_eq!(session.username(), "ana");
    assert!(session.is_admin());

    let wrong_password = users.authenticate("ana", "nope").unwrap_err();
    let unknown_user = users.authenticate("bob", "pw").unwrap_err();
    assert!(matches!(wrong_password, AppError::Unauthorized(_)));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

#[test]
fn update_changes_only_given_fields() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    users.create("root", "pw", RoleKind::Admin).unwrap();
    let user = users.create("ana", "pw", RoleKind::User).unwrap();

    let updated = users
        .update(
            user.id,
            UserUpdate {
                username: Some("ana.m".to_string()),
                password: Some(String::new()),
                role: Some(RoleKind::Admin),
            },
        )
        .unwrap();
    assert_eq!(updated.username, "ana.m");
    assert_eq!(updated.password_hash, user.password_hash);
    assert_eq!(updated.role, RoleKind::Admin);

    users
        .update(
            user.id,
            UserUpdate {
                password: Some("new".to_string()),
                ..UserUpdate::default()
            },
        )
        .unwrap();
    assert!(users.authenticate("ana.m", "new").is_ok());
    assert!(users.authenticate("ana.m", "pw").is_err());
}

#[test]
fn update_rejects_taken_username_and_missing_user() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    users.create("ana", "pw", RoleKind::User).unwrap();
    let ben = users.create("ben", "pw", RoleKind::User).unwrap();

    let taken = UserUpdate {
        username: Some("ana".to_string()),
        ..UserUpdate::default()
    };
    assert!(matches!(
        users.update(ben.id, taken).unwrap_err(),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        users.update(999, UserUpdate::default()).unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[test]
fn last_admin_cannot_be_demoted_or_deleted() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let root = users.create("root", "pw", RoleKind::Admin).unwrap();
    let ana = users.create("ana", "pw", RoleKind::User).unwrap();

    let demote = UserUpdate {
        role: Some(RoleKind::User),
        ..UserUpdate::default()
    };
    assert!(matches!(
        users.update(root.id, demote.clone()).unwrap_err(),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        users.delete(root.id, ana.id).unwrap_err(),
        AppError::Conflict(_)
    ));

    let second = users.create("second", "pw", RoleKind::Admin).unwrap();
    users.update(root.id, demote).unwrap();
    assert_eq!(users.count_admins().unwrap(), 1);
    assert!(users.is_last_admin(second.id).unwrap());
}

#[test]
fn refresh_session_follows_stored_account() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let root = users.create("root", "pw", RoleKind::Admin).unwrap();
    let ana = users.create("ana", "pw", RoleKind::Admin).unwrap();
    let session = users.authenticate("ana", "pw").unwrap();

    users
        .update(
            ana.id,
            UserUpdate {
                username: Some("ana.m".to_string()),
                role: Some(RoleKind::User),
                ..UserUpdate::default()
            },
        )
        .unwrap();
    let refreshed = users.refresh_session(&session).unwrap();
    assert_eq!(refreshed.user_id(), ana.id);
    assert_eq!(refreshed.username(), "ana.m");
    assert_eq!(refreshed.role(), RoleKind::User);

    users.delete(ana.id, root.id).unwrap();
    assert!(matches!(
        users.refresh_session(&session).unwrap_err(),
        AppError::Unauthorized(_)
    ));
}

#[test]
fn delete_refuses_self_and_reports_missing() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    let root = users.create("root", "pw", RoleKind::Admin).unwrap();
    let ana = users.create("ana", "pw", RoleKind::User).unwrap();

    assert!(matches!(
        users.delete(root.id, root.id).unwrap_err(),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        users.delete(999, root.id).unwrap_err(),
        AppError::NotFound(_)
    ));

    users.delete(ana.id, root.id).unwrap();
    assert!(users.get(ana.id).unwrap().is_none());
}

#[test]
fn list_users_is_paginated() {
    let conn = open_db_in_memory().unwrap();
    let users = service(&conn);
    for name in ["a", "b", "c"] {
        users.create(name, "pw", RoleKind::User).unwrap();
    }

    let page = users.list(PageRequest::new(Some(2), Some(2))).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_next);
}

#[test]
fn role_ids_resolve_from_seeded_table() {
    let conn = open_db_in_memory().unwrap();
    let roles = SqliteRoleRepository::new(&conn);

    assert_ne!(
        roles.role_id(RoleKind::Admin).unwrap(),
        roles.role_id(RoleKind::User).unwrap()
    );
}
