//! Tests coordinate extraction across historical field names.

use companion_core::{Coordinates, Record, normalize_coordinates};
use serde_json::json;

fn record(document: serde_json::Value) -> Record {
    Record::from_document("activity_logs", "a1", document).expect("fixture should be an object")
}

#[test]
fn coordinate_normalization_tests_accept_every_naming_convention() {
    let expected = Coordinates::new(-26.2041, 28.0473);
    let documents = [
        json!({"lat": -26.2041, "lng": 28.0473}),
        json!({"latitude": -26.2041, "longitude": 28.0473}),
        json!({"location": {"lat": -26.2041, "lng": 28.0473}}),
        json!({"data": {"latitude": "-26.2041", "longitude": "28.0473"}}),
    ];

    for document in documents {
        assert_eq!(normalize_coordinates(&record(document.clone()).fields), expected, "{document}");
    }
}

#[test]
fn coordinate_normalization_tests_return_none_without_a_pair() {
    for document in [
        json!({}),
        json!({"lat": -26.2}),
        json!({"data": {"latitude": "north"}, "lng": 28.0}),
    ] {
        assert_eq!(normalize_coordinates(&record(document.clone()).fields), None, "{document}");
    }
}
