//! Deterministic in-process document store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use companion_core::{NormalizedTimestamp, Record, normalize_timestamp};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    DocumentStore, FilterOp, ListenerRegistration, QueryConstraint, SnapshotResult, SnapshotSink,
    SortDirection, StoreError,
};

struct Listener {
    id: u64,
    collection: String,
    constraints: Vec<QueryConstraint>,
    sink: SnapshotSink,
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Record>>,
    listeners: Vec<Listener>,
    held: BTreeSet<String>,
    refused: BTreeMap<String, StoreError>,
    write_failure: Option<StoreError>,
    next_listener: u64,
    next_document: u64,
}

impl MemoryState {
    fn query(&self, collection: &str, constraints: &[QueryConstraint]) -> Vec<Record> {
        let documents = self
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        run_query(documents, constraints)
    }

    fn deliveries_for(&self, collection: &str) -> Vec<(SnapshotSink, SnapshotResult)> {
        if self.held.contains(collection) {
            return Vec::new();
        }

        self.listeners
            .iter()
            .filter(|listener| listener.collection == collection)
            .map(|listener| {
                (
                    listener.sink.clone(),
                    Ok(self.query(collection, &listener.constraints)),
                )
            })
            .collect()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        match &self.write_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// In-process [`DocumentStore`] that delivers snapshots synchronously.
///
/// Every write re-broadcasts full query results to the collection's
/// listeners. Collections can be held back to simulate slow subscriptions,
/// and errors can be injected per collection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document and returns the store for chaining.
    pub fn with_document(self, collection: &str, id: &str, document: Value) -> Self {
        self.insert(collection, id, document);
        self
    }

    /// Inserts or replaces a document without checking injected write
    /// failures. Non-object documents are ignored.
    pub fn insert(&self, collection: &str, id: &str, document: Value) {
        let Ok(record) = Record::from_document(collection, id, document) else {
            return;
        };
        let deliveries = match self.lock() {
            Ok(mut state) => {
                upsert(&mut state, record);
                state.deliveries_for(collection)
            }
            Err(_) => return,
        };
        dispatch(deliveries);
    }

    /// Stops deliveries for `collection` until [`MemoryStore::release`].
    pub fn hold(&self, collection: &str) {
        if let Ok(mut state) = self.lock() {
            state.held.insert(collection.to_string());
        }
    }

    /// Resumes deliveries for `collection` and sends current results.
    pub fn release(&self, collection: &str) {
        let deliveries = match self.lock() {
            Ok(mut state) => {
                state.held.remove(collection);
                state.deliveries_for(collection)
            }
            Err(_) => return,
        };
        dispatch(deliveries);
    }

    /// Sends `error` to every listener on `collection`.
    pub fn emit_error(&self, collection: &str, error: StoreError) {
        let sinks = self.sinks_for(collection);
        for sink in sinks {
            sink.deliver(Err(error.clone()));
        }
    }

    /// Makes future `subscribe` calls on `collection` fail with `error`.
    pub fn refuse_subscriptions(&self, collection: &str, error: StoreError) {
        if let Ok(mut state) = self.lock() {
            state.refused.insert(collection.to_string(), error);
        }
    }

    /// Makes every write fail with `error`, or clears the failure on `None`.
    pub fn reject_writes(&self, error: Option<StoreError>) {
        if let Ok(mut state) = self.lock() {
            state.write_failure = error;
        }
    }

    /// Returns the sinks of live listeners on `collection`.
    pub fn sinks_for(&self, collection: &str) -> Vec<SnapshotSink> {
        self.lock()
            .map(|state| {
                state
                    .listeners
                    .iter()
                    .filter(|listener| listener.collection == collection)
                    .map(|listener| listener.sink.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live listeners on `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.lock()
            .map(|state| {
                state
                    .listeners
                    .iter()
                    .filter(|listener| listener.collection == collection)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Documents currently stored in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Record> {
        self.lock()
            .map(|state| state.collections.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(
        &self,
        collection: &str,
        apply: impl FnOnce(&mut MemoryState) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let deliveries = {
            let mut state = self.lock()?;
            state.check_writable()?;
            apply(&mut state)?;
            state.deliveries_for(collection)
        };
        dispatch(deliveries);
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(
        &self,
        collection: &str,
        constraints: &[QueryConstraint],
        sink: SnapshotSink,
    ) -> Result<ListenerRegistration, StoreError> {
        let (id, initial) = {
            let mut state = self.lock()?;
            if let Some(error) = state.refused.get(collection) {
                return Err(error.clone());
            }

            state.next_listener += 1;
            let id = state.next_listener;
            state.listeners.push(Listener {
                id,
                collection: collection.to_string(),
                constraints: constraints.to_vec(),
                sink: sink.clone(),
            });

            let initial = (!state.held.contains(collection))
                .then(|| state.query(collection, constraints));
            (id, initial)
        };

        if let Some(records) = initial {
            sink.deliver(Ok(records));
        }

        let state: Weak<Mutex<MemoryState>> = Arc::downgrade(&self.state);
        Ok(ListenerRegistration::new(move || {
            if let Some(state) = state.upgrade() {
                if let Ok(mut state) = state.lock() {
                    state.listeners.retain(|listener| listener.id != id);
                }
            }
        }))
    }

    fn get_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self.lock()?.query(collection, &[]))
    }

    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError> {
        let mut assigned = String::new();
        self.write(collection, |state| {
            state.next_document += 1;
            assigned = format!("doc-{:06}", state.next_document);
            let record = Record::new(collection, assigned.clone(), data)
                .map_err(|error| StoreError::Rejected(error.to_string()))?;
            upsert(state, record);
            Ok(())
        })?;
        debug!(stage = "store", action = "add", collection);
        Ok(assigned)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        self.write(collection, |state| {
            let record = Record::new(collection, id, data)
                .map_err(|error| StoreError::Rejected(error.to_string()))?;
            upsert(state, record);
            Ok(())
        })
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write(collection, |state| {
            let record = state
                .collections
                .get_mut(collection)
                .and_then(|records| records.iter_mut().find(|record| record.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            record.fields.extend(data);
            Ok(())
        })
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.write(collection, |state| {
            if let Some(records) = state.collections.get_mut(collection) {
                records.retain(|record| record.id != id);
            }
            Ok(())
        })
    }
}

fn upsert(state: &mut MemoryState, record: Record) {
    let records = state.collections.entry(record.collection.clone()).or_default();
    match records.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

fn dispatch(deliveries: Vec<(SnapshotSink, SnapshotResult)>) {
    for (sink, result) in deliveries {
        sink.deliver(result);
    }
}

/// Applies filters, then ordering, then the limit. Ordering drops documents
/// that lack the ordered field.
fn run_query(documents: &[Record], constraints: &[QueryConstraint]) -> Vec<Record> {
    let mut results: Vec<Record> = documents
        .iter()
        .filter(|record| {
            constraints.iter().all(|constraint| match constraint {
                QueryConstraint::Where { field, op, value } => record
                    .field(field)
                    .is_some_and(|actual| matches_filter(actual, *op, value)),
                _ => true,
            })
        })
        .cloned()
        .collect();

    for constraint in constraints {
        if let QueryConstraint::OrderBy { field, direction } = constraint {
            results.retain(|record| record.field(field).is_some_and(|value| !value.is_null()));
            results.sort_by(|left, right| {
                let ordering = left
                    .field(field)
                    .zip(right.field(field))
                    .and_then(|(left, right)| compare_values(left, right))
                    .unwrap_or(Ordering::Equal);
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
    }

    if let Some(limit) = constraints.iter().find_map(|constraint| match constraint {
        QueryConstraint::Limit(limit) => Some(*limit),
        _ => None,
    }) {
        results.truncate(limit);
    }

    results
}

fn matches_filter(actual: &Value, op: FilterOp, expected: &Value) -> bool {
    if op == FilterOp::Equal {
        return actual == expected || compare_values(actual, expected) == Some(Ordering::Equal);
    }
    if op == FilterOp::NotEqual {
        return !matches_filter(actual, FilterOp::Equal, expected);
    }

    let Some(ordering) = compare_values(actual, expected) else {
        return false;
    };
    match op {
        FilterOp::LessThan => ordering == Ordering::Less,
        FilterOp::LessOrEqual => ordering != Ordering::Greater,
        FilterOp::GreaterThan => ordering == Ordering::Greater,
        FilterOp::GreaterOrEqual => ordering != Ordering::Less,
        FilterOp::Equal | FilterOp::NotEqual => false,
    }
}

/// Orders two values of the same kind. Timestamp objects compare by instant.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::Object(_), Value::Object(_)) => {
            match (
                normalize_timestamp(Some(left)),
                normalize_timestamp(Some(right)),
            ) {
                (left @ NormalizedTimestamp::Valid(_), right @ NormalizedTimestamp::Valid(_)) => {
                    Some(left.cmp(&right))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, fields: Value) -> Record {
        Record::from_document("calls", id, fields).unwrap()
    }

    #[test]
    fn order_by_drops_documents_missing_the_field() {
        let documents = vec![
            record("a", json!({"timestamp": "2024-01-01T00:00:00Z"})),
            record("b", json!({})),
            record("c", json!({"timestamp": "2024-03-01T00:00:00Z"})),
        ];
        let results = run_query(
            &documents,
            &[QueryConstraint::order_by("timestamp", SortDirection::Descending)],
        );
        let ids: Vec<&str> = results.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn where_and_limit_compose() {
        let documents = vec![
            record("a", json!({"eventType": "location_share", "n": 1})),
            record("b", json!({"eventType": "login", "n": 2})),
            record("c", json!({"eventType": "location_share", "n": 3})),
        ];
        let results = run_query(
            &documents,
            &[
                QueryConstraint::where_eq("eventType", "location_share"),
                QueryConstraint::order_by("n", SortDirection::Descending),
                QueryConstraint::Limit(1),
            ],
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c");
    }

    #[test]
    fn rejected_writes_leave_documents_untouched() {
        let store = MemoryStore::new().with_document("users", "u1", json!({"status": "active"}));
        store.reject_writes(Some(StoreError::PermissionDenied("rules".to_string())));

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!("suspended"));
        assert!(matches!(
            store.update("users", "u1", patch),
            Err(StoreError::PermissionDenied(_))
        ));
        assert_eq!(store.documents("users")[0].text("status"), Some("active"));
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            store.update("users", "ghost", Map::new()).unwrap_err(),
            StoreError::NotFound {
                collection: "users".to_string(),
                id: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn add_assigns_sequential_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.add("news", Map::new()).unwrap(), "doc-000001");
        assert_eq!(store.add("news", Map::new()).unwrap(), "doc-000002");
    }
}
