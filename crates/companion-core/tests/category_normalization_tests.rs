//! Tests category normalization is total and deterministic.

use companion_core::{ServiceCategory, normalize_category};

#[test]
fn category_normalization_tests_map_free_text_to_canonical_labels() {
    let cases = [
        (Some("fire"), ServiceCategory::FireBrigade),
        (Some("FIRE DEPT"), ServiceCategory::FireBrigade),
        (Some("Gender based violence"), ServiceCategory::Gbv),
        (Some("medical emergency"), ServiceCategory::Ambulance),
        (Some("Childline"), ServiceCategory::ChildSupport),
        (Some("SAPS Police"), ServiceCategory::Police),
        (Some("Cyber"), ServiceCategory::Other("Cyber".to_string())),
        (None, ServiceCategory::Unknown),
    ];

    for (raw, expected) in cases {
        assert_eq!(normalize_category(raw), expected, "input {raw:?}");
    }
}

#[test]
fn category_normalization_tests_are_deterministic() {
    let inputs = ["GBV Support", "fire", "", "police", "Ambulance", "weird label"];
    for raw in inputs {
        let first = normalize_category(Some(raw));
        for _ in 0..5 {
            assert_eq!(normalize_category(Some(raw)), first);
        }
    }
}
