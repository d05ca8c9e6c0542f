//! Integration tests for auth gating of views and actions.

mod common;

use companion_app::{AppConfig, AppError, Severity};
use companion_core::{AccountStatus, Role};
use time::Duration;

#[test]
fn auth_guard_tests_views_require_sign_in() {
    let fixture = common::fixture_with(common::seeded_store(), AppConfig::default());

    assert!(matches!(
        fixture.session.overview(),
        Err(AppError::NotAuthenticated)
    ));
    assert!(matches!(
        fixture.session.users_directory("", None),
        Err(AppError::NotAuthenticated)
    ));
    assert_eq!(fixture.store.listener_count("users"), 0);
}

#[test]
fn auth_guard_tests_expired_session_blocks_actions() {
    let fixture = common::signed_in("root@example.org");
    assert!(fixture.session.operator().is_ok());

    fixture.clock.advance(Duration::hours(2));

    assert!(matches!(
        fixture.session.operator(),
        Err(AppError::NotAuthenticated)
    ));
    let notice = fixture
        .session
        .toggle_user_status("u1", AccountStatus::Active);
    assert_eq!(notice.severity, Severity::Error);
    assert_eq!(notice.message, "Sign in to continue.");

    let user = fixture
        .store
        .documents("users")
        .into_iter()
        .find(|record| record.id == "u1")
        .expect("u1 should still exist");
    assert_eq!(user.text("status"), Some("active"));
}

#[test]
fn auth_guard_tests_role_restricted_actions() {
    let fixture = common::signed_in("mod@example.org");

    let notice = fixture.session.change_role("u1", &Role::SuperAdmin);
    assert!(notice.is_error());
    assert!(notice.message.contains("Super Admin"));

    assert!(matches!(
        fixture.session.require_role("change role", &[Role::SuperAdmin]),
        Err(AppError::Forbidden { .. })
    ));
    let toggled = fixture
        .session
        .toggle_user_status("u1", AccountStatus::Active);
    assert_eq!(toggled.severity, Severity::Success);
}
