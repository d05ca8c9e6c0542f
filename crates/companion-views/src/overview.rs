//! Dashboard overview.

use companion_aggregate::{TimeBucketSeries, WindowSpec, build_time_bucket_series};
use companion_core::{
    AccountStatus, CANONICAL_SERVICE_CATEGORIES, EmergencyCall, RiskLevel, ScamReport,
    ServiceCategory, UserProfile, collections,
};
use companion_sync::SnapshotSet;
use time::OffsetDateTime;

use crate::engine::{SourceSpec, ViewSpec};

/// Headline counts across collections plus the calls trend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewView {
    /// Days covered by the calls trend.
    pub trend_days: u32,
}

impl Default for OverviewView {
    fn default() -> Self {
        Self { trend_days: 7 }
    }
}

/// Derived output of [`OverviewView`].
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewSummary {
    /// Registered users.
    pub total_users: usize,
    /// Users with an active account.
    pub active_users: usize,
    /// Emergency calls.
    pub emergency_calls: usize,
    /// Scam reports.
    pub scam_reports: usize,
    /// Scam reports judged high risk.
    pub high_risk_reports: usize,
    /// Calls per day and category.
    pub calls_trend: TimeBucketSeries<ServiceCategory>,
}

impl ViewSpec for OverviewView {
    type Output = OverviewSummary;

    fn name(&self) -> &'static str {
        "overview"
    }

    fn sources(&self) -> Vec<SourceSpec> {
        vec![
            SourceSpec::required(collections::USERS),
            SourceSpec::required(collections::EMERGENCY_CALLS),
            SourceSpec::required(collections::SCAM_REPORTS),
        ]
    }

    fn compute(&self, snapshot: &SnapshotSet, now: OffsetDateTime) -> OverviewSummary {
        let users: Vec<UserProfile> = snapshot
            .records(collections::USERS)
            .iter()
            .map(UserProfile::from_record)
            .collect();
        let calls: Vec<EmergencyCall> = snapshot
            .records(collections::EMERGENCY_CALLS)
            .iter()
            .map(EmergencyCall::from_record)
            .collect();
        let reports: Vec<ScamReport> = snapshot
            .records(collections::SCAM_REPORTS)
            .iter()
            .map(ScamReport::from_record)
            .collect();

        OverviewSummary {
            total_users: users.len(),
            active_users: users
                .iter()
                .filter(|user| user.status == AccountStatus::Active)
                .count(),
            emergency_calls: calls.len(),
            scam_reports: reports.len(),
            high_risk_reports: reports
                .iter()
                .filter(|report| report.risk == RiskLevel::HighRisk)
                .count(),
            calls_trend: build_time_bucket_series(
                calls.iter().map(|call| (call.timestamp, call.category.clone())),
                WindowSpec::TrailingDays(self.trend_days),
                &CANONICAL_SERVICE_CATEGORIES,
                now,
            ),
        }
    }
}
