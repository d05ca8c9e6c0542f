//! Emergency call monitoring view.

use companion_aggregate::{
    DEFAULT_JOIN_TRUNCATE, JoinedLabel, LookupTable, TimeBucketSeries, WindowSpec,
    build_time_bucket_series, join_labels,
};
use companion_core::{
    CANONICAL_SERVICE_CATEGORIES, EmergencyCall, NormalizedTimestamp, ServiceCategory,
    UserProfile, collections, compare_desc, format_display,
};
use companion_geocode::format_coordinates;
use companion_sync::SnapshotSet;
use time::OffsetDateTime;

use crate::engine::{SourceSpec, ViewSpec};

/// Emergency calls with a trailing-window trend and caller names.
///
/// Calls and users are both required, so rows never render with raw caller
/// ids while the user table is still loading. A failed user subscription
/// still lets the view load, with truncated ids as caller labels.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyCallsView {
    /// Days covered by the trend.
    pub trend_days: u32,
    /// Characters kept from unresolved caller ids.
    pub join_truncate: usize,
    /// Only list calls of this category.
    pub category_filter: Option<ServiceCategory>,
}

impl EmergencyCallsView {
    /// Creates an unfiltered view.
    pub fn new(trend_days: u32, join_truncate: usize) -> Self {
        Self {
            trend_days,
            join_truncate,
            category_filter: None,
        }
    }

    /// Restricts the listed rows to one category. Trend and totals still
    /// cover every call.
    pub fn filtered(mut self, category: ServiceCategory) -> Self {
        self.category_filter = Some(category);
        self
    }
}

impl Default for EmergencyCallsView {
    fn default() -> Self {
        Self::new(7, DEFAULT_JOIN_TRUNCATE)
    }
}

/// One listed call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRow {
    /// Document id.
    pub id: String,
    /// Canonical category.
    pub category: ServiceCategory,
    /// Call time.
    pub timestamp: NormalizedTimestamp,
    /// Display time, `Invalid Date` when unusable.
    pub time: String,
    /// Caller name or fallback.
    pub caller: JoinedLabel,
    /// Formatted caller position.
    pub location: Option<String>,
    /// Response time in seconds.
    pub response_time_secs: Option<f64>,
}

/// Derived output of [`EmergencyCallsView`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyCallsSummary {
    /// Calls per day and category.
    pub trend: TimeBucketSeries<ServiceCategory>,
    /// Calls per category over all time, canonical categories first.
    pub totals: Vec<(ServiceCategory, usize)>,
    /// Listed calls, newest first.
    pub rows: Vec<CallRow>,
    /// All calls, regardless of filter.
    pub total_calls: usize,
}

impl ViewSpec for EmergencyCallsView {
    type Output = EmergencyCallsSummary;

    fn name(&self) -> &'static str {
        "emergency_calls"
    }

    fn sources(&self) -> Vec<SourceSpec> {
        vec![
            SourceSpec::required(collections::EMERGENCY_CALLS),
            SourceSpec::required(collections::USERS),
        ]
    }

    fn compute(&self, snapshot: &SnapshotSet, now: OffsetDateTime) -> EmergencyCallsSummary {
        let calls: Vec<EmergencyCall> = snapshot
            .records(collections::EMERGENCY_CALLS)
            .iter()
            .map(EmergencyCall::from_record)
            .collect();
        let users: Vec<UserProfile> = snapshot
            .records(collections::USERS)
            .iter()
            .map(UserProfile::from_record)
            .collect();

        let trend = build_time_bucket_series(
            calls.iter().map(|call| (call.timestamp, call.category.clone())),
            WindowSpec::TrailingDays(self.trend_days),
            &CANONICAL_SERVICE_CATEGORIES,
            now,
        );

        let mut totals: Vec<(ServiceCategory, usize)> = CANONICAL_SERVICE_CATEGORIES
            .iter()
            .map(|category| (category.clone(), 0))
            .collect();
        for call in &calls {
            match totals.iter_mut().find(|(category, _)| *category == call.category) {
                Some((_, count)) => *count += 1,
                None => totals.push((call.category.clone(), 1)),
            }
        }

        let mut listed: Vec<EmergencyCall> = calls
            .iter()
            .filter(|call| {
                self.category_filter
                    .as_ref()
                    .is_none_or(|category| *category == call.category)
            })
            .cloned()
            .collect();
        listed.sort_by(|left, right| compare_desc(left.timestamp, right.timestamp));

        let table = LookupTable::from_users(&users, self.join_truncate);
        let rows = join_labels(&listed, &table, |call| call.user_id.as_deref())
            .into_iter()
            .map(|joined| CallRow {
                time: format_display(joined.item.timestamp),
                location: joined.item.location.map(format_coordinates),
                id: joined.item.id,
                category: joined.item.category,
                timestamp: joined.item.timestamp,
                caller: joined.label,
                response_time_secs: joined.item.response_time_secs,
            })
            .collect();

        EmergencyCallsSummary {
            trend,
            totals,
            rows,
            total_calls: calls.len(),
        }
    }
}
