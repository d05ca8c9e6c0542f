//! Shared fixtures for aggregation tests.

use companion_core::{EmergencyCall, LocationPing, Record, UserProfile, collections};
use serde_json::{Value, json};

#[allow(dead_code)]
pub fn record(collection: &str, id: &str, document: Value) -> Record {
    Record::from_document(collection, id, document).expect("fixture document is an object")
}

#[allow(dead_code)]
pub fn calls(documents: &[(&str, Value)]) -> Vec<EmergencyCall> {
    documents
        .iter()
        .map(|(id, document)| {
            EmergencyCall::from_record(&record(collections::EMERGENCY_CALLS, id, document.clone()))
        })
        .collect()
}

#[allow(dead_code)]
pub fn pings(documents: &[(&str, Value)]) -> Vec<LocationPing> {
    documents
        .iter()
        .filter_map(|(id, document)| {
            LocationPing::from_record(&record(collections::ACTIVITY_LOGS, id, document.clone()))
        })
        .collect()
}

#[allow(dead_code)]
pub fn user(id: &str, name: &str) -> UserProfile {
    UserProfile::from_record(&record(
        collections::USERS,
        id,
        json!({"name": name, "email": format!("{id}@example.org")}),
    ))
}
