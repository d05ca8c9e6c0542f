//! Tests timestamp normalization across every accepted input shape.

use companion_core::{NormalizedTimestamp, normalize_timestamp};
use serde_json::json;
use time::macros::datetime;

#[test]
fn timestamp_normalization_tests_agree_across_shapes() {
    let native = NormalizedTimestamp::from(datetime!(2023-11-14 22:13:20 UTC));
    let iso = normalize_timestamp(Some(&json!("2023-11-14T22:13:20Z")));
    let offset_iso = normalize_timestamp(Some(&json!("2023-11-15T00:13:20.400+02:00")));
    let epoch_millis = normalize_timestamp(Some(&json!(1_700_000_000_000_i64)));
    let store_pair = normalize_timestamp(Some(&json!({"seconds": 1_700_000_000, "nanoseconds": 5})));
    let admin_pair = normalize_timestamp(Some(&json!({"_seconds": 1_700_000_000, "_nanoseconds": 0})));

    let reference = native.unix_millis().expect("native value is valid");
    for candidate in [iso, offset_iso, epoch_millis, store_pair, admin_pair] {
        let millis = candidate.unix_millis().expect("shape should normalize");
        assert!(
            (millis - reference).abs() < 1_000,
            "{candidate:?} drifted from {native:?}"
        );
    }
}

#[test]
fn timestamp_normalization_tests_yield_sentinel_for_garbage() {
    for raw in [
        json!(null),
        json!("not a date"),
        json!(""),
        json!(true),
        json!({"nanoseconds": 3}),
        json!([2023, 11, 14]),
    ] {
        assert_eq!(
            normalize_timestamp(Some(&raw)),
            NormalizedTimestamp::Invalid,
            "{raw} should be invalid"
        );
    }
    assert_eq!(normalize_timestamp(None), NormalizedTimestamp::Invalid);
}

#[test]
fn timestamp_normalization_tests_yield_sentinel_for_out_of_range_numbers() {
    for raw in [
        json!({"seconds": 1e300}),
        json!({"_seconds": -1e300}),
        json!({"seconds": 1_700_000_000, "nanoseconds": 1e300}),
        json!({"seconds": i64::MAX}),
        json!(1e300),
    ] {
        assert_eq!(
            normalize_timestamp(Some(&raw)),
            NormalizedTimestamp::Invalid,
            "{raw} should be invalid"
        );
    }
}
