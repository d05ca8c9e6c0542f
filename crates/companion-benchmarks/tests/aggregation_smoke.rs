//! Benchmark smoke test for the aggregation paths behind the dashboard views.

use std::sync::Arc;
use std::time::Instant;

use companion_aggregate::{
    LookupTable, WindowSpec, build_time_bucket_series, join_labels, latest_per_entity,
};
use companion_core::{
    CANONICAL_SERVICE_CATEGORIES, EmergencyCall, LocationPing, Record, UserProfile, collections,
};
use companion_sync::MemoryStore;
use companion_views::{EmergencyCallsView, FixedClock, LiveView};
use serde_json::json;
use time::macros::datetime;

const USERS: usize = 500;
const CALLS: usize = 2_000;
const PINGS: usize = 2_000;

fn user_document(index: usize) -> serde_json::Value {
    json!({"name": format!("User {index}"), "email": format!("user{index}@example.org")})
}

fn call_document(index: usize) -> serde_json::Value {
    let kinds = ["Police", "Ambulance", "Fire", "GBV", "Cyber", "Other"];
    json!({
        "type": kinds[index % kinds.len()],
        "timestamp": { "seconds": 1_700_000_000 + (index as i64) * 300, "nanoseconds": 0 },
        "userId": format!("user-{}", index % (USERS + 50)),
    })
}

fn ping_document(index: usize) -> serde_json::Value {
    json!({
        "eventType": "location_share",
        "userId": format!("user-{}", index % USERS),
        "timestamp": 1_700_000_000_000_i64 + (index as i64) * 60_000,
        "location": { "lat": -26.2 + (index % 10) as f64 * 0.001, "lng": 28.04 },
    })
}

fn record(collection: &str, id: String, document: serde_json::Value) -> Record {
    Record::from_document(collection, id, document).expect("fixture record should be valid")
}

#[test]
fn benchmark_aggregation_smoke_prints_latency() {
    let users: Vec<UserProfile> = (0..USERS)
        .map(|index| {
            UserProfile::from_record(&record(
                collections::USERS,
                format!("user-{index}"),
                user_document(index),
            ))
        })
        .collect();
    let calls: Vec<EmergencyCall> = (0..CALLS)
        .map(|index| {
            EmergencyCall::from_record(&record(
                collections::EMERGENCY_CALLS,
                format!("call-{index}"),
                call_document(index),
            ))
        })
        .collect();
    let pings: Vec<LocationPing> = (0..PINGS)
        .filter_map(|index| {
            LocationPing::from_record(&record(
                collections::ACTIVITY_LOGS,
                format!("log-{index}"),
                ping_document(index),
            ))
        })
        .collect();
    let now = datetime!(2023-11-21 12:00 UTC);

    let start = Instant::now();
    let mut resolved = 0usize;
    let mut bucketed = 0usize;
    let mut latest = 0usize;

    for _ in 0..20 {
        let series = build_time_bucket_series(
            calls.iter().map(|call| (call.timestamp, call.category.clone())),
            WindowSpec::ByMonth,
            &CANONICAL_SERVICE_CATEGORIES,
            now,
        );
        bucketed += series.totals().values().sum::<usize>();

        let table = LookupTable::from_users(&users, 8);
        resolved += join_labels(&calls, &table, |call| call.user_id.as_deref())
            .iter()
            .filter(|joined| joined.label.is_resolved())
            .count();

        latest += latest_per_entity(
            pings.iter().cloned(),
            |ping| ping.user_id.clone(),
            |ping| ping.timestamp,
        )
        .len();
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_aggregation_elapsed_ms={elapsed_ms}");
    println!("benchmark_aggregation_bucketed={bucketed} resolved={resolved} latest={latest}");

    assert_eq!(bucketed, CALLS * 20);
    assert_eq!(latest, USERS * 20);
    // This is a lightweight guardrail; strict NFR checks are environment-specific.
    assert!(
        elapsed_ms < 5_000,
        "aggregation smoke benchmark should stay bounded"
    );
}

#[test]
fn benchmark_live_view_recompute_smoke() {
    let store = Arc::new(MemoryStore::new());
    for index in 0..USERS {
        store.insert(collections::USERS, &format!("user-{index}"), user_document(index));
    }
    for index in 0..CALLS {
        store.insert(
            collections::EMERGENCY_CALLS,
            &format!("call-{index}"),
            call_document(index),
        );
    }

    let start = Instant::now();
    let view = LiveView::open(
        store.clone(),
        EmergencyCallsView::default(),
        Arc::new(FixedClock(datetime!(2023-11-21 12:00 UTC))),
    )
    .expect("view should open");
    for index in 0..50 {
        store.insert(
            collections::EMERGENCY_CALLS,
            &format!("extra-{index}"),
            call_document(index),
        );
    }
    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_live_view_elapsed_ms={elapsed_ms}");

    let summary = view.output().expect("view should be ready");
    assert_eq!(summary.total_calls, CALLS + 50);
    assert!(
        elapsed_ms < 10_000,
        "live view recompute smoke benchmark should stay bounded"
    );
}
