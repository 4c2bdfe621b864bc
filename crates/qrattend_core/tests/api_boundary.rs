use qrattend_core::api::{self, AttendanceQuery, INVALID_TOKEN_MESSAGE};
use qrattend_core::db::open_db_in_memory;
use qrattend_core::{
    issue, App, Argon2Hasher, FixedClock, RoleKind, Session, SvgQrRenderer, TokenSigner,
    GENERIC_FAILURE_MESSAGE,
};
use std::sync::Arc;

const SECRET: &str = "test-secret";
/// 2024-01-01T12:00:00Z
const NOW: i64 = 1_704_110_400;

fn app() -> App {
    App::new(
        open_db_in_memory().unwrap(),
        TokenSigner::new(SECRET, 60, 60).unwrap(),
        Arc::new(FixedClock::at(NOW)),
        Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()),
        Arc::new(SvgQrRenderer),
    )
}

fn seed(app: &App) -> (Session, Session) {
    app.users().bootstrap_admin("root", "root-pw").unwrap();
    app.users().create("ana", "ana-pw", RoleKind::User).unwrap();
    let admin = api::login(app, "root", "root-pw").data.unwrap();
    let user = api::login(app, "ana", "ana-pw").data.unwrap();
    (admin, user)
}

#[test]
fn login_reports_generic_credentials_error() {
    let app = app();
    seed(&app);

    let ok = api::login(&app, "ana", "ana-pw");
    assert!(ok.ok);
    assert_eq!(ok.data.unwrap().role(), RoleKind::User);

    let bad = api::login(&app, "ana", "wrong");
    assert!(!bad.ok);
    assert!(bad.data.is_none());
    assert_eq!(bad.message, "invalid username or password");
}

#[test]
fn anonymous_callers_are_rejected_everywhere() {
    let app = app();
    seed(&app);
    let query = AttendanceQuery::default();

    assert_eq!(api::my_qr(&app, None).message, "login required");
    assert!(!api::my_attendance(&app, None, &query).ok);
    assert!(!api::scan_attendance(&app, None, "1:1:aa").ok);
    assert!(!api::list_attendance(&app, None, &query).ok);
    assert!(!api::list_users(&app, None, None, None).ok);
    assert!(!api::delete_attendance(&app, None, 1).ok);
}

#[test]
fn user_role_cannot_reach_admin_handlers() {
    let app = app();
    let (_, user) = seed(&app);
    let query = AttendanceQuery::default();

    let scan = api::scan_attendance(&app, Some(&user), "1:1:aa");
    assert!(!scan.ok);
    assert_eq!(scan.message, "admin role required");
    assert!(!api::list_attendance(&app, Some(&user), &query).ok);
    assert!(!api::export_attendance_csv(&app, Some(&user), &query).ok);
    assert!(!api::add_user(&app, Some(&user), "x", "pw", "User").ok);
    assert!(!api::delete_user(&app, Some(&user), 1).ok);
    assert!(!api::update_attendance(&app, Some(&user), 1).ok);
}

#[test]
fn scan_flow_records_once_per_day() {
    let app = app();
    let (admin, user) = seed(&app);

    let qr = api::my_qr(&app, Some(&user));
    assert!(qr.ok, "{}", qr.message);
    let qr = qr.data.unwrap();
    assert!(qr.token.starts_with(&format!("{}:{NOW}:", user.user_id())));
    assert!(qr.image.contains("<svg"));
    assert_eq!(qr.media_type, "image/svg+xml");

    let first = api::scan_attendance(&app, Some(&admin), &qr.token);
    assert!(first.ok, "{}", first.message);
    assert_eq!(first.message, "attendance recorded for ana");
    assert_eq!(first.data.unwrap().user_id, user.user_id());

    let second = api::scan_attendance(&app, Some(&admin), &qr.token);
    assert!(!second.ok);
    assert_eq!(
        second.message,
        "attendance already recorded for this user on that date"
    );

    let history = api::my_attendance(&app, Some(&user), &AttendanceQuery::default());
    assert_eq!(history.data.unwrap().total, 1);
}

#[test]
fn expired_tampered_or_foreign_tokens_share_one_message() {
    let app = app();
    let (admin, user) = seed(&app);

    let expired = issue(user.user_id(), SECRET, NOW - 61).unwrap();
    let foreign = issue(user.user_id(), "other-secret", NOW).unwrap();
    let fresh = issue(user.user_id(), SECRET, NOW).unwrap();
    let tampered = fresh.replacen(&format!("{}:", user.user_id()), "1:", 1);

    for token in [expired.as_str(), foreign.as_str(), tampered.as_str(), "garbage", ""] {
        let response = api::scan_attendance(&app, Some(&admin), token);
        assert!(!response.ok);
        assert_eq!(response.message, INVALID_TOKEN_MESSAGE);
    }
}

#[test]
fn valid_token_for_removed_user_is_not_found() {
    let app = app();
    let (admin, user) = seed(&app);
    let token = issue(user.user_id(), SECRET, NOW).unwrap();

    assert!(api::delete_user(&app, Some(&admin), user.user_id()).ok);
    let response = api::scan_attendance(&app, Some(&admin), &token);
    assert!(!response.ok);
    assert_eq!(response.message, "user not found");
}

#[test]
fn update_attendance_is_always_rejected() {
    let app = app();
    let (admin, user) = seed(&app);
    let token = issue(user.user_id(), SECRET, NOW).unwrap();
    let record = api::scan_attendance(&app, Some(&admin), &token).data.unwrap();

    let response = api::update_attendance(&app, Some(&admin), record.id);
    assert!(!response.ok);
    assert_eq!(response.message, "attendance records cannot be updated");
}

#[test]
fn admin_manages_users_through_handlers() {
    let app = app();
    let (admin, _) = seed(&app);

    let added = api::add_user(&app, Some(&admin), "ben", "pw", "admin");
    assert!(added.ok, "{}", added.message);
    let ben = added.data.unwrap();
    assert_eq!(ben.role, RoleKind::Admin);

    let bad_role = api::add_user(&app, Some(&admin), "cid", "pw", "Owner");
    assert!(!bad_role.ok);

    let edited = api::edit_user(&app, Some(&admin), ben.id, None, None, Some("User"));
    assert_eq!(edited.data.unwrap().role, RoleKind::User);

    let listed = api::list_users(&app, Some(&admin), None, None).data.unwrap();
    assert_eq!(listed.total, 3);

    let self_delete = api::delete_user(&app, Some(&admin), admin.user_id());
    assert!(!self_delete.ok);
}

#[test]
fn demoted_admin_session_loses_admin_handlers() {
    let app = app();
    let (root, _) = seed(&app);
    let ben = api::add_user(&app, Some(&root), "ben", "ben-pw", "Admin")
        .data
        .unwrap();
    let ben_session = api::login(&app, "ben", "ben-pw").data.unwrap();
    assert!(api::list_users(&app, Some(&ben_session), None, None).ok);

    let demoted = api::edit_user(&app, Some(&root), ben.id, None, None, Some("User"));
    assert!(demoted.ok, "{}", demoted.message);

    let listed = api::list_users(&app, Some(&ben_session), None, None);
    assert!(!listed.ok);
    assert_eq!(listed.message, "admin role required");
    let added = api::add_user(&app, Some(&ben_session), "mallory", "pw", "Admin");
    assert!(!added.ok);
    assert!(app.users().find_by_username("mallory").unwrap().is_none());
    assert!(api::my_qr(&app, Some(&ben_session)).ok);
}

#[test]
fn deleted_user_session_is_rejected() {
    let app = app();
    let (admin, user) = seed(&app);
    assert!(api::delete_user(&app, Some(&admin), user.user_id()).ok);

    let qr = api::my_qr(&app, Some(&user));
    assert!(!qr.ok);
    assert_eq!(qr.message, "session is no longer valid, please log in again");
    assert!(!api::my_attendance(&app, Some(&user), &AttendanceQuery::default()).ok);
    assert!(!api::update_profile(&app, Some(&user), Some("ghost"), None).ok);
}

#[test]
fn profile_update_changes_own_credentials() {
    let app = app();
    let (_, user) = seed(&app);

    let response = api::update_profile(&app, Some(&user), Some("ana2"), Some("new-pw"));
    assert!(response.ok, "{}", response.message);
    assert!(api::login(&app, "ana2", "new-pw").ok);
    assert!(!api::login(&app, "ana", "ana-pw").ok);
}

#[test]
fn csv_exports_respect_scope() {
    let app = app();
    let (admin, user) = seed(&app);
    let token = issue(user.user_id(), SECRET, NOW).unwrap();
    api::scan_attendance(&app, Some(&admin), &token);
    let admin_token = issue(admin.user_id(), SECRET, NOW).unwrap();
    api::scan_attendance(&app, Some(&admin), &admin_token);

    let all = api::export_attendance_csv(&app, Some(&admin), &AttendanceQuery::default());
    assert_eq!(all.data.unwrap().lines().count(), 3);

    let own = api::export_my_attendance_csv(&app, Some(&user), &AttendanceQuery::default());
    let own = own.data.unwrap();
    assert_eq!(own.lines().count(), 2);
    assert!(own.contains(&format!("\r\n{},2024-01-01,", user.user_id())));
}

#[test]
fn storage_failures_surface_generic_message() {
    let app = app();
    let (admin, _) = seed(&app);
    app.connection()
        .execute_batch("DROP TABLE attendances;")
        .unwrap();

    let response = api::list_attendance(&app, Some(&admin), &AttendanceQuery::default());
    assert!(!response.ok);
    assert_eq!(response.message, GENERIC_FAILURE_MESSAGE);
}

#[test]
fn response_serializes_as_envelope() {
    let app = app();
    let response = api::login(&app, "nobody", "pw");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["ok"], false);
    assert!(json["data"].is_null());
    assert_eq!(json["message"], "invalid username or password");
}
