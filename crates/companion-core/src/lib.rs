#![warn(missing_docs)]
//! # companion-core
//!
//! ## Purpose
//! Defines the record model and the normalization boundary shared across the
//! `companion-admin` workspace.
//!
//! ## Responsibilities
//! - Represent store documents as [`Record`] values owned by one collection.
//! - Map free-text categories, mixed timestamp shapes, and historical
//!   coordinate field names onto canonical values.
//! - Convert loosely-typed records into typed entities ([`UserProfile`],
//!   [`EmergencyCall`], [`ScamReport`], [`LocationPing`]) so untyped JSON never
//!   reaches aggregation code.
//!
//! ## Data flow
//! Store snapshot documents -> [`Record::from_document`] -> entity
//! constructors (`from_record`) -> aggregation and views.
//!
//! ## Ownership and lifetimes
//! Records and entities own their strings and JSON maps. Snapshots replace
//! each other wholesale, so nothing here borrows from transport buffers.
//!
//! ## Error model
//! Only record construction can fail ([`CoreError`]). Normalization is total:
//! malformed input becomes a sentinel ([`NormalizedTimestamp::Invalid`],
//! [`ServiceCategory::Unknown`], `None` coordinates), never an error.
//!
//! ## Security and privacy notes
//! Location and identity fields are copied verbatim; this crate never logs
//! record contents.
//!
//! ## Example
//! ```rust
//! use companion_core::{normalize_category, ServiceCategory};
//!
//! assert_eq!(normalize_category(Some("GBV Support")), ServiceCategory::Gbv);
//! assert_eq!(normalize_category(None), ServiceCategory::Unknown);
//! ```

mod category;
mod coordinates;
mod entities;
mod record;
mod timestamp;

pub use category::{
    CANONICAL_SERVICE_CATEGORIES, RiskLevel, ServiceCategory, normalize_category,
    normalize_risk_level,
};
pub use coordinates::{Coordinates, normalize_coordinates};
pub use entities::{
    AccountStatus, EmergencyCall, LocationPing, Role, ScamReport, UserProfile, is_location_event,
};
pub use record::{Record, collections};
pub use timestamp::{
    INVALID_DATE_LABEL, NormalizedTimestamp, compare_desc, format_display, iso_date,
    normalize_timestamp,
};

use thiserror::Error;

/// Error type for record construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Document identifiers must be non-blank.
    #[error("record id is empty")]
    EmptyRecordId,
    /// Collection names must be non-blank.
    #[error("collection name is empty")]
    EmptyCollectionName,
    /// Store documents must be JSON objects.
    #[error("document {id} is not an object (found {kind})")]
    NotAnObject {
        /// Offending document id.
        id: String,
        /// JSON kind that was found instead.
        kind: &'static str,
    },
}
