#![warn(missing_docs)]
//! # companion-views
//!
//! ## Purpose
//! Provides the live aggregation view engine and the dashboard views built
//! on it.
//!
//! ## Responsibilities
//! - Open a view's subscriptions, hold it in a loading state until every
//!   required source reports, and recompute its output on every change.
//! - Surface per-source errors as banners without blocking the view.
//! - Close subscriptions and cancel background work on teardown.
//! - Define the emergency calls, device locator, cyber safety, users
//!   directory and overview views.
//!
//! ## Data flow
//! Store snapshots -> [`companion_sync::SubscriptionManager`] ->
//! [`ViewSpec::compute`] over typed entities -> [`ViewState`] observers.
//!
//! ## Ownership and lifetimes
//! Each [`LiveView`] owns its subscription manager. Outputs are immutable
//! `Arc` values replaced wholesale on recompute, so observers never see a
//! partially built output.
//!
//! ## Error model
//! Source failures become [`Banner`]s. Only engine misuse and poisoned locks
//! surface as [`ViewError`].
//!
//! ## Security and privacy notes
//! Logs carry view names and revisions, never record contents.

mod cyber;
mod emergency;
mod engine;
mod locator;
mod overview;
mod users;

pub use cyber::{CyberSafetySummary, CyberSafetyView, ScamRow};
pub use emergency::{CallRow, EmergencyCallsSummary, EmergencyCallsView};
pub use engine::{
    Banner, Clock, FixedClock, LiveView, SourceRole, SourceSpec, SystemClock, ViewSpec, ViewState,
    ViewStatus,
};
pub use locator::{DeviceLocatorView, DeviceMarker, geocode_targets};
pub use overview::{OverviewSummary, OverviewView};
pub use users::{SIGNUP_SERIES_KEY, UserRow, UsersDirectorySummary, UsersDirectoryView};

use companion_sync::SyncError;
use thiserror::Error;

/// View engine error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    /// Subscription manager failure.
    #[error("subscription error: {0}")]
    Sync(#[from] SyncError),
    /// View state lock was poisoned.
    #[error("view state is unavailable")]
    Poisoned,
}
