//! Integration tests for the concrete dashboard views.

mod common;

use std::sync::Arc;

use companion_aggregate::PLACEHOLDER_SPREAD_DEGREES;
use companion_core::{RiskLevel, Role, ServiceCategory};
use companion_geocode::{GeocodeConfig, StaggeredGeocoder, SyntheticGeocoder, ThreadPacer};
use companion_views::{
    CyberSafetyView, DeviceLocatorView, EmergencyCallsView, LiveView, UsersDirectoryView,
};
use serde_json::json;

#[test]
fn dashboard_views_tests_emergency_calls_trend_totals_and_rows() {
    let store = common::dashboard_store();
    let view = LiveView::open(
        Arc::new(store),
        EmergencyCallsView::default(),
        common::clock(),
    )
    .expect("view should open");
    let summary = view.output().expect("view should be ready");

    assert_eq!(summary.trend.buckets.len(), 7);
    assert_eq!(summary.trend.skipped_invalid, 1);
    let nov_14 = &summary.trend.buckets[4];
    assert_eq!(nov_14.label, "Nov 14");
    assert_eq!(nov_14.count(&ServiceCategory::Gbv), 1);
    assert_eq!(summary.trend.buckets[5].count(&ServiceCategory::FireBrigade), 1);

    assert_eq!(summary.total_calls, 3);
    assert!(summary.totals.contains(&(ServiceCategory::Police, 1)));
    assert!(summary.totals.contains(&(ServiceCategory::Ambulance, 0)));

    let ids: Vec<&str> = summary.rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, vec!["call-2", "call-1", "call-3"]);
    assert_eq!(summary.rows[2].time, "Invalid Date");
    assert_eq!(summary.rows[1].location.as_deref(), Some("-26.204, 28.047"));
}

#[test]
fn dashboard_views_tests_emergency_filter_limits_rows_only() {
    let view = LiveView::open(
        Arc::new(common::dashboard_store()),
        EmergencyCallsView::default().filtered(ServiceCategory::Police),
        common::clock(),
    )
    .expect("view should open");
    let summary = view.output().expect("view should be ready");

    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.rows[0].caller.text(), "Kagiso Dlamini");
    assert_eq!(summary.total_calls, 3);
}

#[test]
fn dashboard_views_tests_device_locator_uses_latest_fix_or_placeholder() {
    let view = LiveView::open(
        Arc::new(common::dashboard_store()),
        DeviceLocatorView::default(),
        common::clock(),
    )
    .expect("view should open");
    let markers = view.output().expect("view should be ready");
    assert_eq!(markers.len(), 2);

    let naledi = markers
        .iter()
        .find(|marker| marker.user_id == "user-alpha-0001")
        .expect("naledi has a marker");
    assert!(!naledi.position.approximate);
    assert_eq!(naledi.position.coordinates.lat, -26.1076);
    assert_eq!(naledi.battery, 81);
    assert_eq!(naledi.last_seen_label, "Nov 15, 2023, 08:00 UTC");

    let kagiso = markers
        .iter()
        .find(|marker| marker.user_id == "user-bravo-0002")
        .expect("kagiso has a marker");
    assert!(kagiso.position.approximate);
    assert!((kagiso.position.coordinates.lat + 26.2041).abs() <= PLACEHOLDER_SPREAD_DEGREES + 1e-9);
    assert_eq!(kagiso.last_seen_label, "Invalid Date");

    let again = view.output().expect("view should be ready");
    assert_eq!(markers, again);
}

#[test]
fn dashboard_views_tests_device_locator_merges_id_and_email_pings() {
    let store = common::dashboard_store();
    store.insert(
        "activity_logs",
        "log-4",
        json!({"eventType": "location_share", "userEmail": "kagiso@example.org",
               "timestamp": "2023-11-15T09:00:00Z", "data": {"latitude": -25.9, "longitude": 28.1}}),
    );
    store.insert(
        "activity_logs",
        "log-5",
        json!({"eventType": "location_share", "userId": "user-bravo-0002",
               "timestamp": "2023-11-14T09:00:00Z", "data": {"latitude": -25.5, "longitude": 28.3}}),
    );
    store.insert(
        "activity_logs",
        "log-6",
        json!({"type": "LOCATION", "userEmail": "naledi@example.org",
               "timestamp": "2023-11-14T09:00:00Z", "data": {"latitude": -30.0, "longitude": 30.0}}),
    );

    let view = LiveView::open(Arc::new(store), DeviceLocatorView::default(), common::clock())
        .expect("view should open");
    let markers = view.output().expect("view should be ready");

    let kagiso = markers
        .iter()
        .find(|marker| marker.user_id == "user-bravo-0002")
        .expect("kagiso has a marker");
    assert!(!kagiso.position.approximate);
    assert_eq!(kagiso.position.coordinates.lat, -25.9);
    assert_eq!(kagiso.last_seen_label, "Nov 15, 2023, 09:00 UTC");

    let naledi = markers
        .iter()
        .find(|marker| marker.user_id == "user-alpha-0001")
        .expect("naledi has a marker");
    assert_eq!(naledi.position.coordinates.lat, -26.1076);
}

#[test]
fn dashboard_views_tests_device_locator_search_and_geocoding() {
    let searched = LiveView::open(
        Arc::new(common::dashboard_store()),
        DeviceLocatorView::with_search("KAGISO"),
        common::clock(),
    )
    .expect("view should open");
    assert_eq!(searched.output().expect("ready").len(), 1);

    let view = LiveView::open(
        Arc::new(common::dashboard_store()),
        DeviceLocatorView::default(),
        common::clock(),
    )
    .expect("view should open");
    let geocoder = StaggeredGeocoder::new(
        Arc::new(SyntheticGeocoder::new()),
        Arc::new(ThreadPacer),
        GeocodeConfig::default(),
    );

    let report = view.resolve_places(&geocoder);
    assert_eq!(report.lookups, 1);
    assert_eq!(report.labels["user-alpha-0001"].text(), "-26.108, 28.057");

    view.close().expect("close should succeed");
    let cancelled = view.resolve_places(&geocoder);
    assert_eq!(cancelled.pending, vec!["user-alpha-0001"]);
}

#[test]
fn dashboard_views_tests_cyber_safety_distribution_and_reporters() {
    let view = LiveView::open(
        Arc::new(common::dashboard_store()),
        CyberSafetyView::default(),
        common::clock(),
    )
    .expect("view should open");
    let summary = view.output().expect("view should be ready");

    assert_eq!(
        summary.distribution,
        vec![
            (RiskLevel::Safe, 1),
            (RiskLevel::Caution, 0),
            (RiskLevel::HighRisk, 1),
            (RiskLevel::Unknown, 0),
        ]
    );
    assert_eq!(summary.high_risk_share(), 50.0);
    assert_eq!(summary.monthly.labels(), vec!["Oct 2023", "Nov 2023"]);
    assert_eq!(summary.rows[0].id, "scam-2");
    assert_eq!(summary.rows[1].reporter.text(), "Kagiso Dlamini");
}

#[test]
fn dashboard_views_tests_users_directory_filters_and_signups() {
    let view = LiveView::open(
        Arc::new(common::dashboard_store()),
        UsersDirectoryView::default(),
        common::clock(),
    )
    .expect("view should open");
    let summary = view.output().expect("view should be ready");

    let labels: Vec<&str> = summary.rows.iter().map(|row| row.label.as_str()).collect();
    assert_eq!(labels, vec!["Kagiso Dlamini", "Naledi Mokoena"]);
    assert_eq!(summary.signups.labels(), vec!["Sep 2023", "Nov 2023"]);
    assert_eq!(summary.total_users, 2);
    assert_eq!(summary.active_users, 1);
    assert!(summary.role_counts.contains(&(Role::CyberAdmin, 1)));

    let analysts = LiveView::open(
        Arc::new(common::dashboard_store()),
        UsersDirectoryView {
            search: String::new(),
            role_filter: Some(Role::CyberAdmin),
        },
        common::clock(),
    )
    .expect("view should open");
    let summary = analysts.output().expect("view should be ready");
    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.rows[0].role_label, "Cyber Analyst");
    assert_eq!(summary.rows[0].joined, "2023-11-01");
}
