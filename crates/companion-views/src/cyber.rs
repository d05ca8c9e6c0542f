//! Cyber safety view.

use companion_aggregate::{
    DEFAULT_JOIN_TRUNCATE, JoinedLabel, LookupTable, TimeBucketSeries, WindowSpec,
    build_time_bucket_series, join_labels,
};
use companion_core::{
    NormalizedTimestamp, RiskLevel, ScamReport, UserProfile, collections, compare_desc,
    format_display,
};
use companion_sync::SnapshotSet;
use time::OffsetDateTime;

use crate::engine::{SourceSpec, ViewSpec};

/// Scam reports by risk level, with reporter names.
///
/// Both sources are required so report rows never render with raw ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyberSafetyView {
    /// Characters kept from unresolved reporter ids.
    pub join_truncate: usize,
}

impl Default for CyberSafetyView {
    fn default() -> Self {
        Self {
            join_truncate: DEFAULT_JOIN_TRUNCATE,
        }
    }
}

/// One listed report.
#[derive(Debug, Clone, PartialEq)]
pub struct ScamRow {
    /// Document id.
    pub id: String,
    /// Reported message.
    pub message: String,
    /// Risk level.
    pub risk: RiskLevel,
    /// Report time.
    pub timestamp: NormalizedTimestamp,
    /// Display time.
    pub time: String,
    /// Reporter name or fallback.
    pub reporter: JoinedLabel,
}

/// Derived output of [`CyberSafetyView`].
#[derive(Debug, Clone, PartialEq)]
pub struct CyberSafetySummary {
    /// Reports per risk level in [`RiskLevel::ALL`] order.
    pub distribution: Vec<(RiskLevel, usize)>,
    /// Reports per month and risk level.
    pub monthly: TimeBucketSeries<RiskLevel>,
    /// Reports, newest first.
    pub rows: Vec<ScamRow>,
}

impl CyberSafetySummary {
    /// Share of reports judged high risk, in percent.
    pub fn high_risk_share(&self) -> f64 {
        let total: usize = self.distribution.iter().map(|(_, count)| count).sum();
        if total == 0 {
            return 0.0;
        }
        let high = self
            .distribution
            .iter()
            .find(|(level, _)| *level == RiskLevel::HighRisk)
            .map_or(0, |(_, count)| *count);
        high as f64 * 100.0 / total as f64
    }
}

impl ViewSpec for CyberSafetyView {
    type Output = CyberSafetySummary;

    fn name(&self) -> &'static str {
        "cyber_safety"
    }

    fn sources(&self) -> Vec<SourceSpec> {
        vec![
            SourceSpec::required(collections::SCAM_REPORTS),
            SourceSpec::required(collections::USERS),
        ]
    }

    fn compute(&self, snapshot: &SnapshotSet, now: OffsetDateTime) -> CyberSafetySummary {
        let mut reports: Vec<ScamReport> = snapshot
            .records(collections::SCAM_REPORTS)
            .iter()
            .map(ScamReport::from_record)
            .collect();
        let users: Vec<UserProfile> = snapshot
            .records(collections::USERS)
            .iter()
            .map(UserProfile::from_record)
            .collect();

        let distribution = RiskLevel::ALL
            .iter()
            .map(|level| {
                let count = reports.iter().filter(|report| report.risk == *level).count();
                (*level, count)
            })
            .collect();

        let monthly = build_time_bucket_series(
            reports.iter().map(|report| (report.timestamp, report.risk)),
            WindowSpec::ByMonth,
            &RiskLevel::ALL,
            now,
        );

        reports.sort_by(|left, right| compare_desc(left.timestamp, right.timestamp));
        let table = LookupTable::from_users(&users, self.join_truncate);
        let rows = join_labels(&reports, &table, |report| report.user_id.as_deref())
            .into_iter()
            .map(|joined| ScamRow {
                time: format_display(joined.item.timestamp),
                id: joined.item.id,
                message: joined.item.message,
                risk: joined.item.risk,
                timestamp: joined.item.timestamp,
                reporter: joined.label,
            })
            .collect();

        CyberSafetySummary {
            distribution,
            monthly,
            rows,
        }
    }
}
