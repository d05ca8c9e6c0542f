//! Subscription manager with joint readiness tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use companion_core::Record;
use tracing::{debug, info, warn};

use crate::{
    DocumentStore, ListenerRegistration, QueryConstraint, SnapshotResult, StoreError, SyncError,
};

/// Opaque handle to one opened subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(usize);

impl SubscriptionHandle {
    /// Returns the slot index inside the owning manager.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Joint readiness of the tracked subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No tracked subscription is open.
    Idle,
    /// Some tracked subscriptions have not reported yet.
    Loading {
        /// Open tracked subscriptions still waiting for a first report.
        pending: usize,
        /// Open tracked subscriptions.
        total: usize,
    },
    /// Every open tracked subscription has reported at least once.
    Ready,
}

/// What a delivery carried.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// A full snapshot replaced the cached record set.
    Snapshot {
        /// Records in the new snapshot.
        count: usize,
    },
    /// The subscription reported an error; the last good records are kept.
    Error(StoreError),
}

/// Change notification passed to the manager listener.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
    /// Subscription that changed.
    pub handle: SubscriptionHandle,
    /// Collection of that subscription.
    pub collection: String,
    /// What was delivered.
    pub outcome: EventOutcome,
    /// `true` on the delivery that completed joint readiness.
    pub became_ready: bool,
}

/// Result of handing a snapshot to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// State was updated.
    Applied,
    /// Subscription was closed or its manager is gone; nothing changed.
    Ignored,
}

/// Current cached state of one subscription.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    /// Subscription handle.
    pub handle: SubscriptionHandle,
    /// Collection name.
    pub collection: String,
    /// Whether this subscription gates readiness.
    pub tracked: bool,
    /// Records from the latest snapshot.
    pub records: Arc<Vec<Record>>,
    /// Latest error, cleared by the next good snapshot.
    pub error: Option<StoreError>,
    /// Whether a snapshot or error has arrived.
    pub reported: bool,
}

/// Consistent copy of every open subscription's state.
#[derive(Debug, Clone)]
pub struct SnapshotSet {
    entries: Vec<CollectionSnapshot>,
    readiness: Readiness,
    revision: u64,
}

impl SnapshotSet {
    /// Records for the first open subscription on `collection`, or an empty
    /// slice when none is open or nothing has arrived yet.
    pub fn records(&self, collection: &str) -> &[Record] {
        self.entries
            .iter()
            .find(|entry| entry.collection == collection)
            .map(|entry| entry.records.as_slice())
            .unwrap_or(&[])
    }

    /// State of one subscription.
    pub fn get(&self, handle: SubscriptionHandle) -> Option<&CollectionSnapshot> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    /// Whether the subscription on `collection` has reported yet.
    pub fn has_reported(&self, collection: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.collection == collection && entry.reported)
    }

    /// Open subscriptions currently in an error state.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &StoreError)> {
        self.entries.iter().filter_map(|entry| {
            entry
                .error
                .as_ref()
                .map(|error| (entry.collection.as_str(), error))
        })
    }

    /// Every open subscription.
    pub fn entries(&self) -> &[CollectionSnapshot] {
        &self.entries
    }

    /// Joint readiness at the time of the copy.
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Shorthand for `readiness() == Readiness::Ready`.
    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    /// Monotonic counter bumped by every applied delivery.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

type ChangeListener = Arc<dyn Fn(&SyncEvent, &SnapshotSet) + Send + Sync>;

struct Slot {
    collection: String,
    tracked: bool,
    records: Arc<Vec<Record>>,
    error: Option<StoreError>,
    reported: bool,
    closed: Arc<AtomicBool>,
    registration: Option<ListenerRegistration>,
}

impl Slot {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct ManagerState {
    slots: Vec<Slot>,
    revision: u64,
    ready_announced: bool,
}

impl ManagerState {
    fn readiness(&self) -> Readiness {
        let mut total = 0;
        let mut pending = 0;
        for slot in self.slots.iter().filter(|slot| slot.tracked && slot.is_open()) {
            total += 1;
            if !slot.reported {
                pending += 1;
            }
        }

        match (total, pending) {
            (0, _) => Readiness::Idle,
            (_, 0) => Readiness::Ready,
            (total, pending) => Readiness::Loading { pending, total },
        }
    }

    fn snapshot(&self) -> SnapshotSet {
        SnapshotSet {
            entries: self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_open())
                .map(|(index, slot)| CollectionSnapshot {
                    handle: SubscriptionHandle(index),
                    collection: slot.collection.clone(),
                    tracked: slot.tracked,
                    records: slot.records.clone(),
                    error: slot.error.clone(),
                    reported: slot.reported,
                })
                .collect(),
            readiness: self.readiness(),
            revision: self.revision,
        }
    }
}

struct Shared {
    state: Mutex<ManagerState>,
    listener: Mutex<Option<ChangeListener>>,
}

impl Shared {
    fn lock_state(&self) -> Result<MutexGuard<'_, ManagerState>, SyncError> {
        self.state.lock().map_err(|_| SyncError::Poisoned)
    }

    fn notify(&self, event: &SyncEvent, snapshot: &SnapshotSet) {
        let listener = match self.listener.lock() {
            Ok(listener) => listener.clone(),
            Err(_) => None,
        };

        if let Some(listener) = listener {
            listener(event, snapshot);
        }
    }
}

/// Receiving end of one live subscription, handed to the store.
///
/// Cloning is cheap. Deliveries after the subscription is closed, or after
/// the manager is dropped, are ignored without touching any state.
#[derive(Clone)]
pub struct SnapshotSink {
    target: Weak<Shared>,
    slot: usize,
    closed: Arc<AtomicBool>,
}

impl SnapshotSink {
    /// Hands one snapshot or error to the manager.
    pub fn deliver(&self, result: SnapshotResult) -> Delivery {
        if self.is_closed() {
            debug!(stage = "sync", action = "late_delivery_ignored", slot = self.slot);
            return Delivery::Ignored;
        }

        let Some(shared) = self.target.upgrade() else {
            return Delivery::Ignored;
        };

        let (event, snapshot) = {
            let Ok(mut state) = shared.lock_state() else {
                warn!(stage = "sync", action = "delivery_dropped", reason = "state poisoned");
                return Delivery::Ignored;
            };

            // Closing flips the flag while holding this lock, so checking again
            // here rules out a close racing the first check.
            if self.is_closed() {
                debug!(stage = "sync", action = "late_delivery_ignored", slot = self.slot);
                return Delivery::Ignored;
            }

            let Some(slot) = state.slots.get_mut(self.slot) else {
                return Delivery::Ignored;
            };

            let outcome = match result {
                Ok(records) => {
                    let count = records.len();
                    slot.records = Arc::new(records);
                    slot.error = None;
                    EventOutcome::Snapshot { count }
                }
                Err(error) => {
                    warn!(
                        stage = "sync",
                        action = "subscription_error",
                        collection = %slot.collection,
                        error = %error
                    );
                    slot.error = Some(error.clone());
                    EventOutcome::Error(error)
                }
            };
            slot.reported = true;
            let collection = slot.collection.clone();

            state.revision += 1;
            let became_ready = !state.ready_announced && state.readiness() == Readiness::Ready;
            if became_ready {
                state.ready_announced = true;
                info!(stage = "sync", action = "ready", revision = state.revision);
            }

            let event = SyncEvent {
                handle: SubscriptionHandle(self.slot),
                collection,
                outcome,
                became_ready,
            };
            (event, state.snapshot())
        };

        shared.notify(&event, &snapshot);
        Delivery::Applied
    }

    /// Returns `true` once the owning subscription is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SnapshotSink {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SnapshotSink")
            .field("slot", &self.slot)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens and tracks live subscriptions for one view.
///
/// Dropping the manager closes every subscription it still holds.
pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
    shared: Arc<Shared>,
}

impl SubscriptionManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState::default()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Installs the change listener, replacing any previous one.
    ///
    /// The listener runs on whichever thread delivered the snapshot, after
    /// internal locks are released.
    ///
    /// # Errors
    /// Returns [`SyncError::Poisoned`] when the listener lock is poisoned.
    pub fn set_listener(
        &self,
        listener: impl Fn(&SyncEvent, &SnapshotSet) + Send + Sync + 'static,
    ) -> Result<(), SyncError> {
        let mut slot = self.shared.listener.lock().map_err(|_| SyncError::Poisoned)?;
        *slot = Some(Arc::new(listener));
        Ok(())
    }

    /// Opens a subscription that gates readiness.
    ///
    /// A store that refuses the subscription outright is recorded as that
    /// subscription's first report, so it cannot block readiness.
    ///
    /// # Errors
    /// Returns [`SyncError::EmptyCollection`] for a blank name and
    /// [`SyncError::Poisoned`] for a poisoned lock.
    pub fn open(
        &self,
        collection: &str,
        constraints: Vec<QueryConstraint>,
    ) -> Result<SubscriptionHandle, SyncError> {
        self.open_with(collection, constraints, true)
    }

    /// Opens a subscription that does not gate readiness, such as a lookup
    /// table whose absence only degrades labels.
    ///
    /// # Errors
    /// Same as [`SubscriptionManager::open`].
    pub fn open_untracked(
        &self,
        collection: &str,
        constraints: Vec<QueryConstraint>,
    ) -> Result<SubscriptionHandle, SyncError> {
        self.open_with(collection, constraints, false)
    }

    fn open_with(
        &self,
        collection: &str,
        constraints: Vec<QueryConstraint>,
        tracked: bool,
    ) -> Result<SubscriptionHandle, SyncError> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(SyncError::EmptyCollection);
        }

        let closed = Arc::new(AtomicBool::new(false));
        let index = {
            let mut state = self.shared.lock_state()?;
            state.slots.push(Slot {
                collection: collection.to_string(),
                tracked,
                records: Arc::new(Vec::new()),
                error: None,
                reported: false,
                closed: closed.clone(),
                registration: None,
            });
            if tracked {
                state.ready_announced = false;
            }
            state.slots.len() - 1
        };

        let sink = SnapshotSink {
            target: Arc::downgrade(&self.shared),
            slot: index,
            closed,
        };
        debug!(stage = "sync", action = "open", collection, tracked);

        // The store may deliver synchronously from inside `subscribe`, so no
        // manager lock is held across this call.
        match self.store.subscribe(collection, &constraints, sink.clone()) {
            Ok(registration) => {
                let orphaned = {
                    let mut state = self.shared.lock_state()?;
                    match state.slots.get_mut(index) {
                        Some(slot) if slot.is_open() => {
                            slot.registration = Some(registration);
                            None
                        }
                        _ => Some(registration),
                    }
                };
                if let Some(registration) = orphaned {
                    registration.unsubscribe();
                }
            }
            Err(error) => {
                sink.deliver(Err(error));
            }
        }

        Ok(SubscriptionHandle(index))
    }

    /// Closes one subscription. Returns `false` when it was already closed.
    ///
    /// After this returns, no delivery for the subscription changes state,
    /// including deliveries already in flight.
    ///
    /// # Errors
    /// Returns [`SyncError::UnknownHandle`] for foreign handles and
    /// [`SyncError::Poisoned`] for a poisoned lock.
    pub fn close(&self, handle: SubscriptionHandle) -> Result<bool, SyncError> {
        let registration = {
            let mut state = self.shared.lock_state()?;
            let slot = state
                .slots
                .get_mut(handle.0)
                .ok_or(SyncError::UnknownHandle(handle.0))?;
            if !slot.is_open() {
                return Ok(false);
            }
            slot.closed.store(true, Ordering::Release);
            slot.records = Arc::new(Vec::new());
            slot.registration.take()
        };

        if let Some(registration) = registration {
            registration.unsubscribe();
        }
        Ok(true)
    }

    /// Closes every open subscription and returns how many were closed.
    /// Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns [`SyncError::Poisoned`] for a poisoned lock.
    pub fn close_all(&self) -> Result<usize, SyncError> {
        let (closed, registrations) = {
            let mut state = self.shared.lock_state()?;
            let mut closed = 0;
            let mut registrations = Vec::new();
            for slot in state.slots.iter_mut().filter(|slot| slot.is_open()) {
                slot.closed.store(true, Ordering::Release);
                slot.records = Arc::new(Vec::new());
                registrations.extend(slot.registration.take());
                closed += 1;
            }
            (closed, registrations)
        };

        for registration in registrations {
            registration.unsubscribe();
        }
        if closed > 0 {
            debug!(stage = "sync", action = "close_all", closed);
        }
        Ok(closed)
    }

    /// Returns joint readiness.
    ///
    /// # Errors
    /// Returns [`SyncError::Poisoned`] for a poisoned lock.
    pub fn readiness(&self) -> Result<Readiness, SyncError> {
        Ok(self.shared.lock_state()?.readiness())
    }

    /// Returns `true` when every tracked subscription has reported.
    pub fn is_ready(&self) -> bool {
        matches!(self.readiness(), Ok(Readiness::Ready))
    }

    /// Returns a consistent copy of all open subscriptions.
    ///
    /// # Errors
    /// Returns [`SyncError::Poisoned`] for a poisoned lock.
    pub fn snapshot(&self) -> Result<SnapshotSet, SyncError> {
        Ok(self.shared.lock_state()?.snapshot())
    }

    /// Returns the store this manager reads from.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        if let Err(error) = self.close_all() {
            warn!(stage = "sync", action = "teardown_failed", error = %error);
        }
    }
}
