//! Integration tests for the demo data migration.

mod common;

use companion_app::{AppConfig, AppError, MigrationStatus, demo_dataset, migrate_demo_data};
use companion_sync::{MemoryStore, StoreError};
use companion_views::FixedClock;
use time::macros::datetime;

#[test]
fn demo_migration_tests_writes_every_collection_with_progress_log() {
    let fixture = common::fixture_with(MemoryStore::new(), AppConfig::default());
    common::sign_in(&fixture, "root@example.org");

    let report = fixture
        .session
        .seed_demo_data()
        .expect("super admin should be allowed to seed");

    assert!(report.succeeded());
    let expected: usize = demo_dataset()
        .iter()
        .map(|collection| collection.documents.len())
        .sum();
    assert_eq!(report.written, expected);
    assert_eq!(fixture.store.documents("users").len(), 8);
    assert_eq!(fixture.store.documents("hotlines").len(), 6);
    assert_eq!(report.log.first().map(String::as_str), Some("18:00:00: Starting migration..."));
    assert!(
        report
            .log
            .iter()
            .any(|line| line.ends_with("Successfully migrated emergencyCalls (8 items)"))
    );
    assert_eq!(report.log.last().map(String::as_str), Some("18:00:00: Migration complete!"));

    let overview = fixture.session.overview().expect("overview should open");
    let summary = overview.output().expect("overview should be ready");
    assert_eq!(summary.total_users, 8);
    assert_eq!(summary.high_risk_reports, 2);
}

#[test]
fn demo_migration_tests_rerun_overwrites_instead_of_duplicating() {
    let store = MemoryStore::new();
    let clock = FixedClock(datetime!(2026-02-22 18:00 UTC));

    let first = migrate_demo_data(&store, &demo_dataset(), &clock);
    let second = migrate_demo_data(&store, &demo_dataset(), &clock);

    assert!(first.succeeded() && second.succeeded());
    assert_eq!(store.documents("stations").len(), 5);
}

#[test]
fn demo_migration_tests_stops_at_first_failure() {
    let store = MemoryStore::new();
    store.reject_writes(Some(StoreError::Unavailable("offline".to_string())));
    let clock = FixedClock(datetime!(2026-02-22 18:00 UTC));

    let report = migrate_demo_data(&store, &demo_dataset(), &clock);

    assert!(matches!(report.status, MigrationStatus::Error(_)));
    assert_eq!(report.written, 0);
    assert!(
        report
            .log
            .last()
            .is_some_and(|line| line.contains("ERROR: store unavailable: offline"))
    );
    assert!(!report.log.iter().any(|line| line.contains("scamReports")));
}

#[test]
fn demo_migration_tests_requires_super_admin() {
    let fixture = common::signed_in("mod@example.org");
    assert!(matches!(
        fixture.session.seed_demo_data(),
        Err(AppError::Forbidden { .. })
    ));
}
