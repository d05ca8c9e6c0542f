//! Live aggregation view engine.

use std::sync::{Arc, Mutex, Weak};

use companion_geocode::CancellationFlag;
use companion_sync::{DocumentStore, QueryConstraint, Readiness, SnapshotSet, SubscriptionManager};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::ViewError;

/// Source of the current time for recomputes.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Whether a source gates the loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// View stays loading until this source reports.
    Required,
    /// Lookup data; the view renders with fallbacks until it arrives.
    Lookup,
}

/// One collection a view subscribes to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    /// Collection name.
    pub collection: &'static str,
    /// Query constraints passed to the store.
    pub constraints: Vec<QueryConstraint>,
    /// Gating role.
    pub role: SourceRole,
}

impl SourceSpec {
    /// Required source without constraints.
    pub fn required(collection: &'static str) -> Self {
        Self {
            collection,
            constraints: Vec::new(),
            role: SourceRole::Required,
        }
    }

    /// Lookup source without constraints.
    pub fn lookup(collection: &'static str) -> Self {
        Self {
            collection,
            constraints: Vec::new(),
            role: SourceRole::Lookup,
        }
    }

    /// Adds a query constraint.
    pub fn with(mut self, constraint: QueryConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Describes what a view subscribes to and how it aggregates.
pub trait ViewSpec: Send + Sync + 'static {
    /// Derived output.
    type Output: Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Collections to subscribe to.
    fn sources(&self) -> Vec<SourceSpec>;

    /// Rebuilds the output from the current snapshots. Must be a pure
    /// function of its arguments.
    fn compute(&self, snapshot: &SnapshotSet, now: OffsetDateTime) -> Self::Output;
}

/// Loading state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// Waiting for required sources.
    Loading {
        /// Required sources that have not reported.
        pending: usize,
        /// Required sources.
        total: usize,
    },
    /// Every required source has reported.
    Ready,
    /// View was torn down.
    Closed,
}

/// Per-collection error banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    /// Failing collection.
    pub collection: String,
    /// Operator-facing text.
    pub message: String,
}

/// Current view state handed to observers.
#[derive(Debug)]
pub struct ViewState<O> {
    /// Loading state.
    pub status: ViewStatus,
    /// Latest output; `None` until the view is first ready.
    pub output: Option<Arc<O>>,
    /// Errors from individual sources.
    pub banners: Vec<Banner>,
    /// Snapshot revision the output was computed from.
    pub revision: u64,
}

impl<O> Clone for ViewState<O> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            output: self.output.clone(),
            banners: self.banners.clone(),
            revision: self.revision,
        }
    }
}

impl<O> ViewState<O> {
    fn loading() -> Self {
        Self {
            status: ViewStatus::Loading {
                pending: 0,
                total: 0,
            },
            output: None,
            banners: Vec::new(),
            revision: 0,
        }
    }

    /// Returns `true` once the view left its loading state.
    pub fn is_ready(&self) -> bool {
        self.status == ViewStatus::Ready
    }
}

type Observer<O> = Arc<dyn Fn(&ViewState<O>) + Send + Sync>;

struct ViewShared<S: ViewSpec> {
    spec: S,
    clock: Arc<dyn Clock>,
    state: Mutex<ViewState<S::Output>>,
    observers: Mutex<Vec<Observer<S::Output>>>,
}

impl<S: ViewSpec> ViewShared<S> {
    fn refresh(&self, snapshot: &SnapshotSet) {
        let banners = snapshot
            .errors()
            .map(|(collection, error)| Banner {
                collection: collection.to_string(),
                message: format!("Could not load {collection}: {error}"),
            })
            .collect();

        let (status, output) = match snapshot.readiness() {
            Readiness::Ready => (
                ViewStatus::Ready,
                Some(Arc::new(self.spec.compute(snapshot, self.clock.now()))),
            ),
            Readiness::Loading { pending, total } => (ViewStatus::Loading { pending, total }, None),
            Readiness::Idle => return,
        };

        let next = {
            let Ok(mut state) = self.state.lock() else {
                warn!(stage = "view", action = "refresh_dropped", view = self.spec.name());
                return;
            };
            // Deliveries from different subscriptions may race; never let an
            // older snapshot overwrite a newer one.
            if state.status == ViewStatus::Closed || snapshot.revision() < state.revision {
                return;
            }
            state.status = status;
            state.banners = banners;
            state.revision = snapshot.revision();
            if output.is_some() {
                state.output = output;
            }
            state.clone()
        };

        debug!(
            stage = "view",
            action = "recomputed",
            view = self.spec.name(),
            revision = next.revision,
            ready = next.is_ready()
        );
        self.notify(&next);
    }

    fn notify(&self, state: &ViewState<S::Output>) {
        let observers = match self.observers.lock() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };
        for observer in observers {
            observer(state);
        }
    }
}

/// One live view: its subscriptions, derived output and teardown.
///
/// Dropping the view closes its subscriptions and cancels background work
/// tied to [`LiveView::cancellation`].
pub struct LiveView<S: ViewSpec> {
    shared: Arc<ViewShared<S>>,
    manager: SubscriptionManager,
    cancellation: CancellationFlag,
}

impl<S: ViewSpec> LiveView<S> {
    /// Opens every source of `spec` against `store`.
    ///
    /// # Errors
    /// Returns [`ViewError::Sync`] when a subscription cannot be registered.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        spec: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ViewError> {
        let sources = spec.sources();
        let shared = Arc::new(ViewShared {
            spec,
            clock,
            state: Mutex::new(ViewState::loading()),
            observers: Mutex::new(Vec::new()),
        });

        let manager = SubscriptionManager::new(store);
        let target: Weak<ViewShared<S>> = Arc::downgrade(&shared);
        manager.set_listener(move |_, snapshot| {
            if let Some(shared) = target.upgrade() {
                shared.refresh(snapshot);
            }
        })?;

        for source in sources {
            match source.role {
                SourceRole::Required => manager.open(source.collection, source.constraints)?,
                SourceRole::Lookup => {
                    manager.open_untracked(source.collection, source.constraints)?
                }
            };
        }
        debug!(stage = "view", action = "opened", view = shared.spec.name());

        shared.refresh(&manager.snapshot()?);
        Ok(Self {
            shared,
            manager,
            cancellation: CancellationFlag::new(),
        })
    }

    /// Current state.
    ///
    /// # Errors
    /// Returns [`ViewError::Poisoned`] when the state lock is poisoned.
    pub fn state(&self) -> Result<ViewState<S::Output>, ViewError> {
        self.shared
            .state
            .lock()
            .map(|state| state.clone())
            .map_err(|_| ViewError::Poisoned)
    }

    /// Latest output, if the view has been ready at least once.
    pub fn output(&self) -> Option<Arc<S::Output>> {
        self.state().ok().and_then(|state| state.output)
    }

    /// Registers an observer called after every recompute.
    ///
    /// # Errors
    /// Returns [`ViewError::Poisoned`] when the observer lock is poisoned.
    pub fn observe(
        &self,
        observer: impl Fn(&ViewState<S::Output>) + Send + Sync + 'static,
    ) -> Result<(), ViewError> {
        self.shared
            .observers
            .lock()
            .map_err(|_| ViewError::Poisoned)?
            .push(Arc::new(observer));
        Ok(())
    }

    /// The view definition.
    pub fn spec(&self) -> &S {
        &self.shared.spec
    }

    /// Flag cancelled when the view closes.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Closes all subscriptions and cancels background work. Idempotent.
    ///
    /// # Errors
    /// Returns [`ViewError::Sync`] when teardown hits a poisoned lock.
    pub fn close(&self) -> Result<(), ViewError> {
        self.cancellation.cancel();
        self.manager.close_all()?;
        if let Ok(mut state) = self.shared.state.lock() {
            state.status = ViewStatus::Closed;
        }
        Ok(())
    }
}

impl<S: ViewSpec> Drop for LiveView<S> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(stage = "view", action = "teardown_failed", error = %error);
        }
    }
}
