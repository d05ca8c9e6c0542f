//! Typed entities produced at the normalization boundary.

use crate::category::{RiskLevel, ServiceCategory, normalize_category, normalize_risk_level};
use crate::coordinates::{Coordinates, normalize_coordinates};
use crate::record::Record;
use crate::timestamp::{NormalizedTimestamp, normalize_timestamp};

const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "createdAt", "time"];
const USER_ID_FIELDS: [&str; 2] = ["userId", "uid"];

/// Staff and app-user role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Full administrative access.
    SuperAdmin,
    /// Content moderation.
    Moderator,
    /// Health directory administration.
    HealthAdmin,
    /// Cyber-safety analysis.
    CyberAdmin,
    /// Regular app user.
    User,
    /// Role string not known to this build, preserved verbatim.
    Other(String),
}

impl Role {
    /// Every known role, in privilege order.
    pub const KNOWN: [Role; 5] = [
        Role::SuperAdmin,
        Role::Moderator,
        Role::HealthAdmin,
        Role::CyberAdmin,
        Role::User,
    ];

    /// Parses a stored role string. Missing roles default to [`Role::User`].
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("user") => Self::User,
            Some("super_admin") => Self::SuperAdmin,
            Some("moderator") => Self::Moderator,
            Some("health_admin") => Self::HealthAdmin,
            Some("cyber_admin") => Self::CyberAdmin,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// Returns the stored string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Moderator => "moderator",
            Self::HealthAdmin => "health_admin",
            Self::CyberAdmin => "cyber_admin",
            Self::User => "user",
            Self::Other(raw) => raw,
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &str {
        match self {
            Self::SuperAdmin => "Super Admin",
            Self::Moderator => "Moderator",
            Self::HealthAdmin => "Health Admin",
            Self::CyberAdmin => "Cyber Analyst",
            Self::User => "User",
            Self::Other(raw) => raw,
        }
    }
}

/// Account status of an app user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    /// Account may use the app.
    Active,
    /// Account is blocked.
    Suspended,
}

impl AccountStatus {
    /// Parses a stored status; anything other than `active` reads as suspended.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("active") => Self::Active,
            _ => Self::Suspended,
        }
    }

    /// Returns the stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    /// Returns the opposite status.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Suspended,
            Self::Suspended => Self::Active,
        }
    }
}

/// App user as shown in directories and on the device map.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// Document id.
    pub id: String,
    /// Display name, if any.
    pub name: Option<String>,
    /// Contact email, if any.
    pub email: Option<String>,
    /// Assigned role.
    pub role: Role,
    /// Account status.
    pub status: AccountStatus,
    /// Sign-up time.
    pub created_at: NormalizedTimestamp,
    /// Last activity reported on the profile itself.
    pub last_seen: NormalizedTimestamp,
    /// Device battery percentage reported on the profile.
    pub battery: Option<u8>,
    /// Device signal quality reported on the profile.
    pub signal: Option<String>,
}

impl UserProfile {
    /// Reads a user document.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            name: record
                .first_text(&["name", "displayName", "fullName"])
                .map(str::to_string),
            email: record.text("email").map(str::to_string),
            role: Role::parse(record.text("role")),
            status: AccountStatus::parse(record.text("status")),
            created_at: normalize_timestamp(record.field("createdAt")),
            last_seen: normalize_timestamp(record.first_field(&["lastSeen", "lastActive"])),
            battery: battery_percent(record),
            signal: record.text("signal").map(str::to_string),
        }
    }

    /// Returns the name, falling back to the email.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.email.as_deref())
    }

    /// Case-insensitive substring match over name and email.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [self.name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

/// Emergency call placed from the app.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyCall {
    /// Document id.
    pub id: String,
    /// Canonical service category.
    pub category: ServiceCategory,
    /// Call time.
    pub timestamp: NormalizedTimestamp,
    /// Calling user id.
    pub user_id: Option<String>,
    /// Caller location.
    pub location: Option<Coordinates>,
    /// Time to first responder acknowledgement, in seconds.
    pub response_time_secs: Option<f64>,
}

impl EmergencyCall {
    /// Reads an emergency call document.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            category: normalize_category(record.first_text(&["category", "type", "serviceType"])),
            timestamp: normalize_timestamp(record.first_field(&TIMESTAMP_FIELDS)),
            user_id: record.first_text(&USER_ID_FIELDS).map(str::to_string),
            location: normalize_coordinates(&record.fields),
            response_time_secs: record.number("responseTime"),
        }
    }
}

/// Message reported as a possible scam.
#[derive(Debug, Clone, PartialEq)]
pub struct ScamReport {
    /// Document id.
    pub id: String,
    /// Reported message text.
    pub message: String,
    /// Normalized risk level.
    pub risk: RiskLevel,
    /// Report time.
    pub timestamp: NormalizedTimestamp,
    /// Reporting user id.
    pub user_id: Option<String>,
}

impl ScamReport {
    /// Reads a scam report document.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            message: record
                .first_text(&["message", "text", "content"])
                .unwrap_or_default()
                .to_string(),
            risk: normalize_risk_level(record.first_text(&["riskLevel", "risk", "verdict"])),
            timestamp: normalize_timestamp(record.first_field(&TIMESTAMP_FIELDS)),
            user_id: record.first_text(&USER_ID_FIELDS).map(str::to_string),
        }
    }
}

/// One location share from device telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPing {
    /// Document id.
    pub id: String,
    /// Reporting user id.
    pub user_id: Option<String>,
    /// Reporting user email, used by older app builds instead of the id.
    pub user_email: Option<String>,
    /// Fix time.
    pub timestamp: NormalizedTimestamp,
    /// Reported position, when recognizable.
    pub coordinates: Option<Coordinates>,
    /// Device battery percentage.
    pub battery: Option<u8>,
    /// Device signal quality.
    pub signal: Option<String>,
}

impl LocationPing {
    /// Reads an activity log document; returns `None` for non-location events.
    pub fn from_record(record: &Record) -> Option<Self> {
        if !is_location_event(record) {
            return None;
        }

        Some(Self {
            id: record.id.clone(),
            user_id: record.first_text(&USER_ID_FIELDS).map(str::to_string),
            user_email: record.text("userEmail").map(str::to_string),
            timestamp: normalize_timestamp(record.first_field(&TIMESTAMP_FIELDS)),
            coordinates: normalize_coordinates(&record.fields),
            battery: battery_percent(record),
            signal: record.text("signal").map(str::to_string),
        })
    }

    /// Returns `true` when this ping belongs to `user`, by id or by email.
    pub fn belongs_to(&self, user: &UserProfile) -> bool {
        self.user_id.as_deref() == Some(user.id.as_str())
            || (self.user_email.is_some() && self.user_email == user.email)
    }
}

/// Returns `true` for activity log entries that carry a location share.
pub fn is_location_event(record: &Record) -> bool {
    record.text("eventType") == Some("location_share")
        || record
            .text("type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case("location"))
}

fn battery_percent(record: &Record) -> Option<u8> {
    record
        .number("battery")
        .map(|value| value.clamp(0.0, 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_roles_are_preserved() {
        assert_eq!(Role::parse(Some("auditor")), Role::Other("auditor".to_string()));
        assert_eq!(Role::parse(None), Role::User);
        assert_eq!(Role::CyberAdmin.label(), "Cyber Analyst");
    }

    #[test]
    fn location_events_match_either_marker() {
        let by_event = Record::from_document(
            "activity_logs",
            "a1",
            json!({"eventType": "location_share", "userId": "u1"}),
        )
        .unwrap();
        let by_type =
            Record::from_document("activity_logs", "a2", json!({"type": "Location"})).unwrap();
        let other =
            Record::from_document("activity_logs", "a3", json!({"eventType": "login"})).unwrap();

        assert!(LocationPing::from_record(&by_event).is_some());
        assert!(LocationPing::from_record(&by_type).is_some());
        assert!(LocationPing::from_record(&other).is_none());
    }

    #[test]
    fn email_only_pings_match_by_email() {
        let user = UserProfile::from_record(
            &Record::from_document("users", "u1", json!({"email": "a@b.test"})).unwrap(),
        );
        let ping = LocationPing::from_record(
            &Record::from_document(
                "activity_logs",
                "a1",
                json!({"type": "LOCATION", "userEmail": "a@b.test"}),
            )
            .unwrap(),
        )
        .unwrap();
        assert!(ping.belongs_to(&user));
    }
}
