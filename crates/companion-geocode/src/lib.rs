#![warn(missing_docs)]
//! # companion-geocode
//!
//! ## Purpose
//! Turns device positions into place names without tripping third-party rate
//! limits.
//!
//! ## Responsibilities
//! - Define a backend-agnostic reverse-geocoding trait.
//! - Space lookups by a fixed per-item delay.
//! - Stop a batch mid-way when its view is torn down.
//! - Fall back to formatted coordinates on failure or miss.
//! - Provide a deterministic synthetic geocoder for tests and demos.
//!
//! ## Data flow
//! `(entity id, coordinates)` pairs -> cache check -> paced
//! [`ReverseGeocoder::resolve`] calls -> [`BatchReport`] of place labels.
//!
//! ## Ownership and lifetimes
//! The batch runner owns its cache behind a mutex; callers own reports.
//! Cancellation flags are shared handles; cancelling wakes any pacer wait
//! on the same flag.
//!
//! ## Error model
//! Lookup failures are [`GeocodeError`] values that never abort a batch; the
//! affected entity gets a coordinate label instead.
//!
//! ## Security and privacy notes
//! Coordinates are never logged; log events carry entity counts only.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use companion_core::Coordinates;
use thiserror::Error;
use tracing::{debug, warn};

/// Default spacing between outbound lookups, in milliseconds.
pub const DEFAULT_GEOCODE_DELAY_MS: u64 = 1_100;

/// Pacing configuration for lookup batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodeConfig {
    /// Delay between consecutive outbound lookups.
    pub delay_ms: u64,
}

impl GeocodeConfig {
    /// Creates validated pacing configuration.
    ///
    /// # Errors
    /// Returns [`GeocodeError::InvalidDelay`] when `delay_ms == 0`.
    pub fn new(delay_ms: u64) -> Result<Self, GeocodeError> {
        if delay_ms == 0 {
            return Err(GeocodeError::InvalidDelay);
        }
        Ok(Self { delay_ms })
    }
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_GEOCODE_DELAY_MS,
        }
    }
}

/// Reverse-geocoding provider.
pub trait ReverseGeocoder: Send + Sync {
    /// Resolves a position to a place name, or `None` when unknown.
    ///
    /// # Errors
    /// Returns [`GeocodeError`] for transport failures and rate limiting.
    fn resolve(&self, coordinates: Coordinates) -> Result<Option<String>, GeocodeError>;
}

/// Waits between lookups.
pub trait Pacer: Send + Sync {
    /// Blocks the batch for `duration`, returning early once `cancel` is set.
    fn pause(&self, duration: Duration, cancel: &CancellationFlag);
}

/// Pacer that blocks the calling thread until the delay passes or the batch
/// is cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration, cancel: &CancellationFlag) {
        cancel.wait_timeout(duration);
    }
}

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Shared flag that stops a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<CancellationState>);

impl CancellationFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self
            .0
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.0.wake.notify_all();
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self
            .0
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for up to `duration`. Returns `true` when woken by
    /// cancellation.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let cancelled = self
            .0
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .0
            .wake
            .wait_timeout_while(cancelled, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

/// Label shown for one entity's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceLabel {
    /// Resolved place name.
    Place(String),
    /// Formatted coordinates used as fallback.
    Coordinates(String),
}

impl PlaceLabel {
    /// Display text.
    pub fn text(&self) -> &str {
        match self {
            Self::Place(text) | Self::Coordinates(text) => text,
        }
    }
}

/// Result of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Label per entity id, for every entity processed before cancellation.
    pub labels: BTreeMap<String, PlaceLabel>,
    /// Outbound lookups made.
    pub lookups: usize,
    /// Entities served from cache.
    pub cache_hits: usize,
    /// Entities that fell back to coordinates.
    pub fallbacks: usize,
    /// Entities left unprocessed because the batch was cancelled.
    pub pending: Vec<String>,
}

impl BatchReport {
    /// Returns `true` when the batch stopped early.
    pub fn was_cancelled(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Formats a position as `lat, lng` with three decimals.
pub fn format_coordinates(coordinates: Coordinates) -> String {
    format!("{:.3}, {:.3}", coordinates.lat, coordinates.lng)
}

/// Returns the dispatch offset of each lookup relative to batch start.
pub fn dispatch_offsets(config: GeocodeConfig, count: usize) -> Vec<u64> {
    (0..count)
        .map(|index| config.delay_ms.saturating_mul(index as u64))
        .collect()
}

/// Runs paced, cancellable lookup batches with a place cache.
pub struct StaggeredGeocoder {
    geocoder: Arc<dyn ReverseGeocoder>,
    pacer: Arc<dyn Pacer>,
    config: GeocodeConfig,
    cache: Mutex<HashMap<String, String>>,
}

impl StaggeredGeocoder {
    /// Creates a batch runner.
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        pacer: Arc<dyn Pacer>,
        config: GeocodeConfig,
    ) -> Self {
        Self {
            geocoder,
            pacer,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves labels for `items` in order.
    ///
    /// Cached positions cost no lookup and no delay. Consecutive outbound
    /// lookups are separated by the configured delay. The flag is checked
    /// before and after every pause; once set, the remaining ids are
    /// returned in [`BatchReport::pending`].
    pub fn resolve_batch(
        &self,
        items: &[(String, Coordinates)],
        cancel: &CancellationFlag,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, (entity_id, coordinates)) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                report.pending = remaining_ids(items, index);
                break;
            }

            let key = format_coordinates(*coordinates);
            if let Some(place) = self.cached(&key) {
                report.cache_hits += 1;
                report.labels.insert(entity_id.clone(), PlaceLabel::Place(place));
                continue;
            }

            if report.lookups > 0 {
                self.pacer.pause(Duration::from_millis(self.config.delay_ms), cancel);
                if cancel.is_cancelled() {
                    report.pending = remaining_ids(items, index);
                    break;
                }
            }

            report.lookups += 1;
            let label = match self.geocoder.resolve(*coordinates) {
                Ok(Some(place)) => {
                    self.remember(key, place.clone());
                    PlaceLabel::Place(place)
                }
                Ok(None) => {
                    report.fallbacks += 1;
                    PlaceLabel::Coordinates(key)
                }
                Err(error) => {
                    warn!(stage = "geocode", action = "lookup_failed", error = %error);
                    report.fallbacks += 1;
                    PlaceLabel::Coordinates(key)
                }
            };
            report.labels.insert(entity_id.clone(), label);
        }

        debug!(
            stage = "geocode",
            action = "batch_done",
            lookups = report.lookups,
            cache_hits = report.cache_hits,
            pending = report.pending.len()
        );
        report
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: String, place: String) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, place);
        }
    }
}

fn remaining_ids(items: &[(String, Coordinates)], from: usize) -> Vec<String> {
    items[from..].iter().map(|(id, _)| id.clone()).collect()
}

/// Deterministic geocoder for tests and demos.
#[derive(Debug, Default)]
pub struct SyntheticGeocoder {
    places: Vec<(Coordinates, String)>,
    failure: Option<GeocodeError>,
    calls: Mutex<usize>,
}

impl SyntheticGeocoder {
    /// Creates a geocoder that knows no places.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a known place, matched at three-decimal precision.
    pub fn with_place(mut self, coordinates: Coordinates, name: impl Into<String>) -> Self {
        self.places.push((coordinates, name.into()));
        self
    }

    /// Makes every lookup fail with `error`.
    pub fn failing(mut self, error: GeocodeError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of lookups served.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|calls| *calls).unwrap_or(0)
    }
}

impl ReverseGeocoder for SyntheticGeocoder {
    fn resolve(&self, coordinates: Coordinates) -> Result<Option<String>, GeocodeError> {
        let mut calls = self.calls.lock().map_err(|_| GeocodeError::Poisoned)?;
        *calls += 1;

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let key = format_coordinates(coordinates);
        Ok(self
            .places
            .iter()
            .find(|(known, _)| format_coordinates(*known) == key)
            .map(|(_, name)| name.clone()))
    }
}

/// Geocoding error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeocodeError {
    /// Delay must be positive.
    #[error("invalid geocode delay: must be greater than zero")]
    InvalidDelay,
    /// Provider asked us to slow down.
    #[error("geocoding rate limited")]
    RateLimited,
    /// Provider unreachable.
    #[error("geocoding unavailable: {0}")]
    Unavailable(String),
    /// Internal lock poisoned.
    #[error("geocoder state is unavailable")]
    Poisoned,
}
