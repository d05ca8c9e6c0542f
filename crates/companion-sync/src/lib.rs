#![warn(missing_docs)]
//! # companion-sync
//!
//! ## Purpose
//! Keeps a view's live record sets in step with the remote document store.
//!
//! ## Responsibilities
//! - Define the store contract ([`DocumentStore`]) the dashboard depends on.
//! - Open, track, and tear down named live subscriptions
//!   ([`SubscriptionManager`]).
//! - Report joint readiness once every tracked subscription has delivered a
//!   snapshot or an error.
//! - Drop callbacks that arrive for closed subscriptions.
//! - Provide [`MemoryStore`], a deterministic in-process store for tests and
//!   demos.
//!
//! ## Data flow
//! Store listener -> [`SnapshotSink::deliver`] -> slot replaced wholesale ->
//! readiness recomputed -> change listener receives a [`SnapshotSet`].
//!
//! ## Ownership and lifetimes
//! Each manager exclusively owns its cached record sets. Snapshots are shared
//! out as `Arc<Vec<Record>>`, so readers never observe a half-applied update.
//! Sinks hold only a weak reference back to the manager.
//!
//! ## Error model
//! Store failures are values ([`StoreError`]) delivered per subscription and
//! never tear down siblings. Manager misuse and poisoned locks surface as
//! [`SyncError`].
//!
//! ## Security and privacy notes
//! Logged events carry collection names and counts, never record contents.

mod manager;
mod memory;

pub use manager::{
    CollectionSnapshot, Delivery, EventOutcome, Readiness, SnapshotSet, SnapshotSink,
    SubscriptionHandle, SubscriptionManager, SyncEvent,
};
pub use memory::MemoryStore;

use companion_core::Record;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result carried by one snapshot delivery.
pub type SnapshotResult = Result<Vec<Record>, StoreError>;

/// Sort direction for [`QueryConstraint::OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Comparison operator for [`QueryConstraint::Where`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals value.
    Equal,
    /// Field differs from value.
    NotEqual,
    /// Field is less than value.
    LessThan,
    /// Field is less than or equal to value.
    LessOrEqual,
    /// Field is greater than value.
    GreaterThan,
    /// Field is greater than or equal to value.
    GreaterOrEqual,
}

/// Query constraint passed verbatim to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryConstraint {
    /// Order results by a field.
    OrderBy {
        /// Field to order by.
        field: String,
        /// Sort direction.
        direction: SortDirection,
    },
    /// Filter results by a field comparison.
    Where {
        /// Field to compare.
        field: String,
        /// Comparison operator.
        op: FilterOp,
        /// Right-hand operand.
        value: Value,
    },
    /// Cap the number of results.
    Limit(usize),
}

impl QueryConstraint {
    /// Shorthand for [`QueryConstraint::OrderBy`].
    pub fn order_by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self::OrderBy {
            field: field.into(),
            direction,
        }
    }

    /// Shorthand for an equality [`QueryConstraint::Where`].
    pub fn where_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Where {
            field: field.into(),
            op: FilterOp::Equal,
            value: value.into(),
        }
    }
}

/// Cancels one store-side listener.
pub struct ListenerRegistration {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    /// Wraps a store-specific cancel callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Registration with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Stops the store-side listener.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ListenerRegistration")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Remote document store contract.
///
/// Implementations push snapshots into the given [`SnapshotSink`] from
/// whatever thread or event loop they run on. Every snapshot is the complete
/// current result set for the query, never a diff.
pub trait DocumentStore: Send + Sync {
    /// Starts a live query.
    fn subscribe(
        &self,
        collection: &str,
        constraints: &[QueryConstraint],
        sink: SnapshotSink,
    ) -> Result<ListenerRegistration, StoreError>;

    /// Reads every document in a collection once.
    fn get_all(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Adds a document with a store-assigned id and returns the id.
    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError>;

    /// Creates or replaces a document under a caller-chosen id.
    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError>;

    /// Merges fields into an existing document.
    fn update(&self, collection: &str, id: &str, data: Map<String, Value>)
    -> Result<(), StoreError>;

    /// Deletes a document.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Failure reported by the remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Security rules denied the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Write was rejected.
    #[error("write rejected: {0}")]
    Rejected(String),
    /// Target document does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },
    /// Store returned data that could not be mirrored.
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Subscription manager errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Collection names must be non-blank.
    #[error("collection name is empty")]
    EmptyCollection,
    /// Handle does not belong to this manager.
    #[error("unknown subscription handle {0}")]
    UnknownHandle(usize),
    /// Internal lock was poisoned by a panicking listener.
    #[error("subscription state is unavailable")]
    Poisoned,
}
