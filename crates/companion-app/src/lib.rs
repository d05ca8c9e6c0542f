#![warn(missing_docs)]
//! # companion-app
//!
//! ## Purpose
//! Orchestrates auth, live views, write-back actions and device commands for
//! the companion admin dashboard.
//!
//! ## Responsibilities
//! - Load runtime configuration and initialize logging.
//! - Gate every dashboard view and action behind an authenticated staff
//!   context.
//! - Turn write-back failures into operator notices without touching local
//!   state.
//! - Seed a store with the demo dataset.
//! - Provide transport security checks, log redaction and the device command
//!   kill switch.
//!
//! ## Data flow
//! Config + auth context -> [`DashboardSession`] -> live views over the
//! document store; operator actions -> store writes -> snapshots flow back
//! into the open views.
//!
//! ## Ownership and lifetimes
//! The session shares the store, auth context and clock through `Arc`s. Each
//! opened view owns its subscriptions and releases them when dropped.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Operator actions convert
//! them into [`OperatorNotice`] values at the call site.
//!
//! ## Security and privacy notes
//! - Views and actions refuse to run without a signed-in staff member.
//! - Kill-switch env var stops device command dispatch at runtime.
//! - Log redaction helpers strip token and credential strings.

mod actions;
mod config;
mod migration;
mod notice;
mod session;

pub use actions::{BulkDeleteConfirmation, ContentKind, STATION_CLOSED, STATION_OPEN};
pub use config::{
    AUTH_ENDPOINT_VAR, AppConfig, COMMANDS_ENABLED_VAR, ConfigError, FUNCTIONS_ENDPOINT_VAR,
    GEOCODE_DELAY_VAR, JOIN_TRUNCATE_VAR, LOG_FILTER_VAR, TREND_DAYS_VAR,
};
pub use migration::{
    DemoCollection, MigrationReport, MigrationStatus, demo_dataset, migrate_demo_data,
};
pub use notice::{OperatorNotice, Severity};
pub use session::DashboardSession;

use companion_auth::AuthError;
use companion_commands::CommandError;
use companion_geocode::GeocodeError;
use companion_sync::StoreError;
use companion_views::ViewError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("COMPANION_ADMIN_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Redacts common secret markers in log-safe output.
///
/// Everything from the first marker to the end of the line is replaced.
pub fn redact_sensitive(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            ["password", "token", "authorization", "bearer"]
                .iter()
                .fold(line.to_string(), |line, key| redact_key_value(&line, key))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn redact_key_value(input: &str, key: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if let Some(position) = lower.find(key) {
        let prefix = &input[..position];
        return format!("{prefix}{key}=<redacted>");
    }

    input.to_string()
}

/// Checks the device command kill-switch env var.
///
/// Semantics:
/// - Unset => commands enabled.
/// - `0`, `false`, `off` (case-insensitive) => commands disabled.
/// - Any other value => commands enabled.
pub fn commands_enabled_from_env() -> bool {
    config::switch_enabled(std::env::var(COMMANDS_ENABLED_VAR).ok().as_deref())
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
/// Returns [`AppError::Logging`] for an invalid filter or when a subscriber is
/// already installed.
pub fn init_tracing(filter: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(filter).map_err(|error| AppError::Logging(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| AppError::Logging(error.to_string()))
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Auth subsystem error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// View engine error.
    #[error("view error: {0}")]
    View(#[from] ViewError),
    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Device command error.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
    /// Reverse-geocoding error.
    #[error("geocode error: {0}")]
    Geocode(#[from] GeocodeError),
    /// No staff member is signed in, or the session expired.
    #[error("sign-in required")]
    NotAuthenticated,
    /// Signed-in staff member lacks the role for an action.
    #[error("{action} requires one of: {required}")]
    Forbidden {
        /// Refused action.
        action: &'static str,
        /// Accepted role labels.
        required: String,
    },
    /// Device command dispatch is switched off.
    #[error("device commands are disabled")]
    CommandsDisabled,
    /// Operator input was rejected before any write.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Logging could not be initialized.
    #[error("logging error: {0}")]
    Logging(String),
}
