//! Tests time-bucketed trend series.

mod common;

use companion_aggregate::{WindowSpec, build_time_bucket_series};
use companion_core::{
    CANONICAL_SERVICE_CATEGORIES, NormalizedTimestamp, ServiceCategory, normalize_timestamp,
};
use serde_json::json;
use time::macros::datetime;

#[test]
fn trend_series_tests_bucket_mixed_shapes_into_canonical_categories() {
    let calls = common::calls(&[
        ("c1", json!({"category": "GBV Support", "timestamp": {"seconds": 1_700_000_000}})),
        ("c2", json!({"category": "fire", "timestamp": "2023-11-15T00:00:00Z"})),
    ]);
    let now = datetime!(2023-11-16 09:00 UTC);

    let series = build_time_bucket_series(
        calls.iter().map(|call| (call.timestamp, call.category.clone())),
        WindowSpec::TrailingDays(7),
        &CANONICAL_SERVICE_CATEGORIES,
        now,
    );

    assert_eq!(series.buckets.len(), 7);
    // 1_700_000_000 is 2023-11-14 22:13:20 UTC.
    let nov_14 = series.buckets.iter().find(|bucket| bucket.label == "Nov 14").unwrap();
    let nov_15 = series.buckets.iter().find(|bucket| bucket.label == "Nov 15").unwrap();
    assert_eq!(nov_14.count(&ServiceCategory::Gbv), 1);
    assert_eq!(nov_14.total(), 1);
    assert_eq!(nov_15.count(&ServiceCategory::FireBrigade), 1);
    assert_eq!(nov_15.total(), 1);
    assert_eq!(series.totals()[&ServiceCategory::Police], 0);
}

#[test]
fn trend_series_tests_fixed_window_shape_ignores_records() {
    let now = datetime!(2024-06-30 23:59 UTC);
    let empty = build_time_bucket_series(
        Vec::<(NormalizedTimestamp, ServiceCategory)>::new(),
        WindowSpec::TrailingDays(7),
        &CANONICAL_SERVICE_CATEGORIES,
        now,
    );
    let busy = build_time_bucket_series(
        (0..500).map(|minute| {
            (
                NormalizedTimestamp::from(now - time::Duration::minutes(minute * 13)),
                ServiceCategory::Ambulance,
            )
        }),
        WindowSpec::TrailingDays(7),
        &CANONICAL_SERVICE_CATEGORIES,
        now,
    );

    assert_eq!(empty.labels(), busy.labels());
    assert_eq!(empty.labels().len(), 7);
    assert_eq!(empty.labels().first().copied(), Some("Jun 24"));
    assert_eq!(empty.labels().last().copied(), Some("Jun 30"));
    assert!(empty.buckets.windows(2).all(|pair| pair[0].start < pair[1].start));
    assert_eq!(busy.totals()[&ServiceCategory::Ambulance] + busy.outside_window, 500);
}

#[test]
fn trend_series_tests_invalid_timestamps_are_skipped() {
    let calls = common::calls(&[
        ("c1", json!({"category": "police", "timestamp": "garbage"})),
        ("c2", json!({"category": "police"})),
    ]);
    let series = build_time_bucket_series(
        calls.iter().map(|call| (call.timestamp, call.category.clone())),
        WindowSpec::TrailingDays(7),
        &CANONICAL_SERVICE_CATEGORIES,
        datetime!(2024-01-01 00:00 UTC),
    );
    assert_eq!(series.skipped_invalid, 2);
    assert_eq!(series.totals()[&ServiceCategory::Police], 0);
}

#[test]
fn trend_series_tests_monthly_buckets_sort_by_date_not_label() {
    let points = [
        ("2024-02-10T00:00:00Z", "b"),
        ("2023-12-01T00:00:00Z", "a"),
        ("2024-02-20T00:00:00Z", "a"),
        ("2023-04-05T00:00:00Z", "a"),
    ]
    .map(|(raw, key)| {
        (
            companion_core::normalize_timestamp(Some(&json!(raw))),
            key,
        )
    });

    let series = build_time_bucket_series(
        points,
        WindowSpec::ByMonth,
        &[],
        datetime!(2024-03-01 00:00 UTC),
    );

    assert_eq!(series.labels(), vec!["Apr 2023", "Dec 2023", "Feb 2024"]);
    assert_eq!(series.keys, vec!["b", "a"]);
    let february = &series.buckets[2];
    assert_eq!(february.count(&"a"), 1);
    assert_eq!(february.count(&"b"), 1);
    assert_eq!(series.buckets[0].count(&"b"), 0);
}

#[test]
fn trend_series_tests_repeat_runs_are_identical() {
    let calls = common::calls(&[
        ("c1", json!({"category": "Police", "timestamp": "2024-06-29T10:00:00Z"})),
        ("c2", json!({"category": "medical", "timestamp": "2024-06-30T11:00:00Z"})),
        ("c3", json!({"category": "Police", "timestamp": "not a date"})),
    ]);
    let now = datetime!(2024-06-30 12:00 UTC);
    let run = || {
        build_time_bucket_series(
            calls.iter().map(|call| (call.timestamp, call.category.clone())),
            WindowSpec::TrailingDays(7),
            &CANONICAL_SERVICE_CATEGORIES,
            now,
        )
    };

    let first = run();
    assert_eq!(first, run());
    assert_eq!(first.buckets.iter().map(|bucket| bucket.total()).sum::<usize>(), 2);
}

#[test]
fn trend_series_tests_count_unshiftable_instants_outside_window() {
    let edge = normalize_timestamp(Some(&json!("9999-12-31T23:30:00Z")));
    assert!(edge.is_valid());
    let now = datetime!(2024-06-30 12:00 +02:00);

    for window in [WindowSpec::TrailingDays(7), WindowSpec::ByMonth] {
        let series = build_time_bucket_series([(edge, "late")], window, &[], now);
        assert_eq!(series.outside_window, 1);
        assert_eq!(series.skipped_invalid, 0);
        assert!(series.buckets.iter().all(|bucket| bucket.total() == 0));
    }
}
