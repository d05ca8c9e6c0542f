//! Users directory view.

use companion_aggregate::{TimeBucketSeries, WindowSpec, build_time_bucket_series};
use companion_core::{AccountStatus, Role, UserProfile, collections, format_display, iso_date};
use companion_sync::SnapshotSet;
use time::OffsetDateTime;

use crate::engine::{SourceSpec, ViewSpec};

/// Series key for monthly sign-ups.
pub const SIGNUP_SERIES_KEY: &str = "Sign-ups";

/// Searchable user directory with monthly sign-ups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersDirectoryView {
    /// Case-insensitive name/email filter.
    pub search: String,
    /// Only list users with this role.
    pub role_filter: Option<Role>,
}

/// One listed user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    /// Document id.
    pub id: String,
    /// Name, falling back to email, then id.
    pub label: String,
    /// Email.
    pub email: Option<String>,
    /// Role.
    pub role: Role,
    /// Role display label.
    pub role_label: String,
    /// Account status.
    pub status: AccountStatus,
    /// Sign-up date as `YYYY-MM-DD`, empty when unknown.
    pub joined: String,
    /// Last activity, `Invalid Date` when unknown.
    pub last_seen: String,
}

/// Derived output of [`UsersDirectoryView`].
#[derive(Debug, Clone, PartialEq)]
pub struct UsersDirectorySummary {
    /// Listed users, sorted by label.
    pub rows: Vec<UserRow>,
    /// Users per role across the whole directory, known roles first.
    pub role_counts: Vec<(Role, usize)>,
    /// Sign-ups per month across the whole directory.
    pub signups: TimeBucketSeries<&'static str>,
    /// Users in the directory.
    pub total_users: usize,
    /// Active users in the directory.
    pub active_users: usize,
}

impl ViewSpec for UsersDirectoryView {
    type Output = UsersDirectorySummary;

    fn name(&self) -> &'static str {
        "users_directory"
    }

    fn sources(&self) -> Vec<SourceSpec> {
        vec![SourceSpec::required(collections::USERS)]
    }

    fn compute(&self, snapshot: &SnapshotSet, now: OffsetDateTime) -> UsersDirectorySummary {
        let users: Vec<UserProfile> = snapshot
            .records(collections::USERS)
            .iter()
            .map(UserProfile::from_record)
            .collect();

        let mut role_counts: Vec<(Role, usize)> =
            Role::KNOWN.iter().map(|role| (role.clone(), 0)).collect();
        for user in &users {
            match role_counts.iter_mut().find(|(role, _)| *role == user.role) {
                Some((_, count)) => *count += 1,
                None => role_counts.push((user.role.clone(), 1)),
            }
        }

        let signups = build_time_bucket_series(
            users.iter().map(|user| (user.created_at, SIGNUP_SERIES_KEY)),
            WindowSpec::ByMonth,
            &[SIGNUP_SERIES_KEY],
            now,
        );

        let mut rows: Vec<UserRow> = users
            .iter()
            .filter(|user| user.matches_search(&self.search))
            .filter(|user| self.role_filter.as_ref().is_none_or(|role| *role == user.role))
            .map(|user| UserRow {
                id: user.id.clone(),
                label: user.display_name().unwrap_or(user.id.as_str()).to_string(),
                email: user.email.clone(),
                role: user.role.clone(),
                role_label: user.role.label().to_string(),
                status: user.status,
                joined: iso_date(user.created_at),
                last_seen: format_display(user.last_seen),
            })
            .collect();
        rows.sort_by_key(|row| row.label.to_lowercase());

        UsersDirectorySummary {
            rows,
            role_counts,
            signups,
            total_users: users.len(),
            active_users: users
                .iter()
                .filter(|user| user.status == AccountStatus::Active)
                .count(),
        }
    }
}
