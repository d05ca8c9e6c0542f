//! Integration tests for the device command kill switch.

mod common;

use companion_app::{AppConfig, Severity, commands_enabled_from_env};
use companion_commands::{CommandTarget, DeviceAction};
use companion_core::collections;

#[test]
fn kill_switch_behavior_tests_disables_commands_when_env_is_false() {
    // Safety:
    // - Integration tests mutate process env in a single-threaded test body.
    // - We reset the variable before returning.
    unsafe { std::env::set_var("COMPANION_ADMIN_COMMANDS_ENABLED", "false") };
    assert!(!commands_enabled_from_env());

    // Safety: see rationale above.
    unsafe { std::env::set_var("COMPANION_ADMIN_COMMANDS_ENABLED", "true") };
    assert!(commands_enabled_from_env());

    // Safety: see rationale above.
    unsafe { std::env::remove_var("COMPANION_ADMIN_COMMANDS_ENABLED") };
}

#[test]
fn kill_switch_behavior_tests_disabled_switch_writes_nothing() {
    let config = AppConfig {
        commands_enabled: false,
        ..AppConfig::default()
    };
    let fixture = common::fixture_with(common::seeded_store(), config);
    common::sign_in(&fixture, "cyber@example.org");

    let notice = fixture.session.send_device_command(
        DeviceAction::Ring,
        CommandTarget {
            user_id: "u1".to_string(),
            user_email: Some("amara@example.com".to_string()),
        },
        None,
    );

    assert_eq!(notice.severity, Severity::Warning);
    assert!(fixture.store.documents(collections::DEVICE_COMMANDS).is_empty());
    assert!(fixture.store.documents(collections::DEVICE_COMMAND_AUDIT).is_empty());
}
