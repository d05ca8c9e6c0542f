#![warn(missing_docs)]
//! # companion-aggregate
//!
//! ## Purpose
//! Folds normalized record sets into the derived views the dashboard renders.
//!
//! ## Responsibilities
//! - Build time-bucketed count series over a fixed trailing window or by
//!   calendar month.
//! - Resolve foreign identifiers to display names with a truncated fallback.
//! - Select the latest record per entity.
//! - Derive stable placeholder telemetry for entities without data.
//!
//! ## Data flow
//! Typed entities from `companion-core` -> aggregation functions -> owned
//! output values rendered by views.
//!
//! ## Ownership and lifetimes
//! Every function takes its input by reference or by iterator and returns a
//! freshly built value. No state survives between calls, so every snapshot
//! delivery triggers a full recompute.
//!
//! ## Error model
//! Aggregation is total. Invalid timestamps are counted as skipped instead of
//! failing a series, unresolved identifiers fall back to truncated ids, and
//! missing positions fall back to placeholders.
//!
//! ## Security and privacy notes
//! Placeholder values are derived from entity ids with SHA-256 but carry no
//! secrecy guarantees; they exist only to keep rendering stable.
//!
//! ## Example
//! ```rust
//! use companion_aggregate::{WindowSpec, build_time_bucket_series};
//! use companion_core::{NormalizedTimestamp, ServiceCategory};
//! use time::macros::datetime;
//!
//! let now = datetime!(2023-11-15 12:00 UTC);
//! let points = [(NormalizedTimestamp::from(now), ServiceCategory::Police)];
//! let series = build_time_bucket_series(points, WindowSpec::TrailingDays(7), &[], now);
//! assert_eq!(series.buckets.len(), 7);
//! assert_eq!(series.totals().get(&ServiceCategory::Police), Some(&1));
//! ```

mod join;
mod latest;
mod placeholder;
mod series;

pub use join::{DEFAULT_JOIN_TRUNCATE, Joined, JoinedLabel, LookupTable, join_labels, truncate_id};
pub use latest::{latest_matching, latest_per_entity};
pub use placeholder::{
    PLACEHOLDER_CENTER, PLACEHOLDER_SPREAD_DEGREES, PlaceholderTelemetry, PositionFix,
    placeholder_telemetry, position_or_placeholder,
};
pub use series::{TimeBucket, TimeBucketSeries, WindowSpec, build_time_bucket_series};
