//! Device locator view.

use std::collections::BTreeMap;

use companion_aggregate::{
    PositionFix, latest_per_entity, placeholder_telemetry, position_or_placeholder,
};
use companion_core::{
    AccountStatus, Coordinates, LocationPing, NormalizedTimestamp, UserProfile, collections,
    format_display,
};
use companion_geocode::{BatchReport, StaggeredGeocoder};
use companion_sync::SnapshotSet;
use time::OffsetDateTime;

use crate::engine::{LiveView, SourceSpec, ViewSpec};

/// One map marker per user, positioned from the latest location ping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceLocatorView {
    /// Case-insensitive name/email filter; blank shows everyone.
    pub search: String,
}

impl DeviceLocatorView {
    /// Creates a view filtered by `search`.
    pub fn with_search(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
        }
    }
}

/// Marker for one user's device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMarker {
    /// User document id.
    pub user_id: String,
    /// Name, falling back to email.
    pub label: String,
    /// User email.
    pub email: Option<String>,
    /// Account status.
    pub status: AccountStatus,
    /// Position; approximate when the user never shared a location.
    pub position: PositionFix,
    /// Battery percentage.
    pub battery: u8,
    /// Signal quality.
    pub signal: String,
    /// Time of the latest fix or profile activity.
    pub last_seen: NormalizedTimestamp,
    /// Display form of `last_seen`.
    pub last_seen_label: String,
}

impl ViewSpec for DeviceLocatorView {
    type Output = Vec<DeviceMarker>;

    fn name(&self) -> &'static str {
        "device_locator"
    }

    fn sources(&self) -> Vec<SourceSpec> {
        vec![
            SourceSpec::required(collections::USERS),
            SourceSpec::required(collections::ACTIVITY_LOGS),
        ]
    }

    fn compute(&self, snapshot: &SnapshotSet, _now: OffsetDateTime) -> Vec<DeviceMarker> {
        let pings: Vec<LocationPing> = snapshot
            .records(collections::ACTIVITY_LOGS)
            .iter()
            .filter_map(LocationPing::from_record)
            .collect();
        let latest = LatestPings::new(&pings);

        snapshot
            .records(collections::USERS)
            .iter()
            .map(UserProfile::from_record)
            .filter(|user| user.matches_search(&self.search))
            .map(|user| marker_for(&user, latest.for_user(&user)))
            .collect()
    }
}

/// Newest ping per user id and per email, with each ping's input position.
///
/// Older clients only send an email, so a user's latest ping is the newer of
/// the two lookups; on equal timestamps the earlier ping wins.
struct LatestPings<'a> {
    by_id: BTreeMap<String, (usize, &'a LocationPing)>,
    by_email: BTreeMap<String, (usize, &'a LocationPing)>,
}

impl<'a> LatestPings<'a> {
    fn new(pings: &'a [LocationPing]) -> Self {
        Self {
            by_id: latest_per_entity(
                pings.iter().enumerate(),
                |(_, ping)| ping.user_id.clone(),
                |(_, ping)| ping.timestamp,
            ),
            by_email: latest_per_entity(
                pings.iter().enumerate(),
                |(_, ping)| ping.user_email.clone(),
                |(_, ping)| ping.timestamp,
            ),
        }
    }

    fn for_user(&self, user: &UserProfile) -> Option<&'a LocationPing> {
        let by_id = self.by_id.get(&user.id).copied();
        let by_email = user
            .email
            .as_ref()
            .and_then(|email| self.by_email.get(email))
            .copied();

        match (by_id, by_email) {
            (Some(id_match), Some(email_match)) => {
                let email_newer = email_match.1.timestamp > id_match.1.timestamp
                    || (email_match.1.timestamp == id_match.1.timestamp
                        && email_match.0 < id_match.0);
                Some(if email_newer { email_match.1 } else { id_match.1 })
            }
            (single, other) => single.or(other).map(|(_, ping)| ping),
        }
    }
}

fn marker_for(user: &UserProfile, latest: Option<&LocationPing>) -> DeviceMarker {
    let placeholder = placeholder_telemetry(&user.id);

    let fix = latest.and_then(|ping| ping.coordinates);
    let last_seen = latest
        .map(|ping| ping.timestamp)
        .filter(|timestamp| timestamp.is_valid())
        .unwrap_or(user.last_seen);

    DeviceMarker {
        user_id: user.id.clone(),
        label: user.display_name().unwrap_or(user.id.as_str()).to_string(),
        email: user.email.clone(),
        status: user.status,
        position: position_or_placeholder(&user.id, fix),
        battery: user
            .battery
            .or_else(|| latest.and_then(|ping| ping.battery))
            .unwrap_or(placeholder.battery),
        signal: user
            .signal
            .clone()
            .or_else(|| latest.and_then(|ping| ping.signal.clone()))
            .unwrap_or_else(|| placeholder.signal.to_string()),
        last_seen,
        last_seen_label: format_display(last_seen),
    }
}

/// Markers with a real fix, as `(user id, position)` pairs for geocoding.
pub fn geocode_targets(markers: &[DeviceMarker]) -> Vec<(String, Coordinates)> {
    markers
        .iter()
        .filter(|marker| !marker.position.approximate)
        .map(|marker| (marker.user_id.clone(), marker.position.coordinates))
        .collect()
}

impl LiveView<DeviceLocatorView> {
    /// Resolves place names for the current markers. The batch stops when
    /// the view closes.
    pub fn resolve_places(&self, geocoder: &StaggeredGeocoder) -> BatchReport {
        let targets = self
            .output()
            .map(|markers| geocode_targets(&markers))
            .unwrap_or_default();
        geocoder.resolve_batch(&targets, &self.cancellation())
    }
}
