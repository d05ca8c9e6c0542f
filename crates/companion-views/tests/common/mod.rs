//! Shared fixtures for view tests.

use std::sync::Arc;

use companion_sync::MemoryStore;
use companion_views::{Clock, FixedClock};
use serde_json::json;
use time::macros::datetime;

/// Fixed "now" used by every view test.
#[allow(dead_code)]
pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(datetime!(2023-11-16 09:00 UTC)))
}

/// Store seeded with a small, realistic dashboard dataset.
#[allow(dead_code)]
pub fn dashboard_store() -> MemoryStore {
    MemoryStore::new()
        .with_document(
            "users",
            "user-alpha-0001",
            json!({"name": "Naledi Mokoena", "email": "naledi@example.org", "role": "user",
                   "status": "active", "createdAt": "2023-09-03T10:00:00Z", "battery": 81}),
        )
        .with_document(
            "users",
            "user-bravo-0002",
            json!({"name": "Kagiso Dlamini", "email": "kagiso@example.org", "role": "cyber_admin",
                   "status": "suspended", "createdAt": {"seconds": 1_698_796_800}}),
        )
        .with_document(
            "emergencyCalls",
            "call-1",
            json!({"category": "GBV Support", "timestamp": {"seconds": 1_700_000_000},
                   "userId": "user-alpha-0001", "location": {"lat": -26.2041, "lng": 28.0473}}),
        )
        .with_document(
            "emergencyCalls",
            "call-2",
            json!({"type": "fire", "timestamp": "2023-11-15T00:00:00Z", "userId": "user-ghost-9999"}),
        )
        .with_document(
            "emergencyCalls",
            "call-3",
            json!({"category": "Police", "timestamp": "not a date", "userId": "user-bravo-0002"}),
        )
        .with_document(
            "scamReports",
            "scam-1",
            json!({"message": "You won a prize", "riskLevel": "HIGH RISK",
                   "timestamp": "2023-10-02T08:00:00Z", "userId": "user-bravo-0002"}),
        )
        .with_document(
            "scamReports",
            "scam-2",
            json!({"message": "Lunch at 12?", "riskLevel": "safe",
                   "timestamp": "2023-11-10T08:00:00Z", "userId": "user-alpha-0001"}),
        )
        .with_document(
            "activity_logs",
            "log-1",
            json!({"eventType": "location_share", "userId": "user-alpha-0001",
                   "timestamp": "2023-11-15T07:00:00Z", "data": {"latitude": -25.7479, "longitude": 28.2293}}),
        )
        .with_document(
            "activity_logs",
            "log-2",
            json!({"eventType": "location_share", "userId": "user-alpha-0001",
                   "timestamp": "2023-11-15T08:00:00Z", "battery": 40,
                   "data": {"latitude": -26.1076, "longitude": 28.0567}}),
        )
        .with_document("activity_logs", "log-3", json!({"eventType": "login", "userId": "user-bravo-0002"}))
}
