//! Timestamp normalization across ISO strings, epoch numbers, and
//! `{seconds, nanoseconds}` store timestamps.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Display text for the invalid sentinel.
pub const INVALID_DATE_LABEL: &str = "Invalid Date";

/// Internal timestamp representation.
///
/// `Invalid` orders before every valid instant, so "latest" selections and
/// descending sorts push unusable timestamps to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizedTimestamp {
    /// Input could not be interpreted as an instant.
    Invalid,
    /// A valid instant.
    Valid(OffsetDateTime),
}

impl NormalizedTimestamp {
    /// Returns the instant when valid.
    pub fn value(self) -> Option<OffsetDateTime> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Invalid => None,
        }
    }

    /// Returns `true` for valid instants.
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Returns epoch milliseconds when valid.
    pub fn unix_millis(self) -> Option<i128> {
        self.value()
            .map(|value| value.unix_timestamp_nanos() / 1_000_000)
    }
}

impl From<OffsetDateTime> for NormalizedTimestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self::Valid(value)
    }
}

/// Converts a raw timestamp field into a [`NormalizedTimestamp`].
///
/// Accepted shapes:
/// - RFC 3339 strings, zone-less ISO date-times (read as UTC), and bare
///   `YYYY-MM-DD` dates.
/// - JSON numbers, read as epoch milliseconds.
/// - `{seconds, nanoseconds}` or `{_seconds, _nanoseconds}` objects.
///
/// Anything else, including `None` and `null`, yields
/// [`NormalizedTimestamp::Invalid`].
pub fn normalize_timestamp(raw: Option<&Value>) -> NormalizedTimestamp {
    let parsed = match raw {
        Some(Value::String(text)) => parse_text(text),
        Some(number @ Value::Number(_)) => whole_number(number).and_then(from_unix_millis),
        Some(Value::Object(map)) => from_seconds_pair(map),
        _ => None,
    };

    parsed
        .and_then(|value| value.checked_to_offset(UtcOffset::UTC))
        .map_or(NormalizedTimestamp::Invalid, NormalizedTimestamp::Valid)
}

/// Formats a timestamp for tables, or [`INVALID_DATE_LABEL`].
pub fn format_display(timestamp: NormalizedTimestamp) -> String {
    timestamp
        .value()
        .and_then(|value| {
            value
                .checked_to_offset(UtcOffset::UTC)?
                .format(format_description!(
                    "[month repr:short] [day padding:none], [year], [hour]:[minute] UTC"
                ))
                .ok()
        })
        .unwrap_or_else(|| INVALID_DATE_LABEL.to_string())
}

/// Formats a timestamp as `YYYY-MM-DD` (UTC), or an empty string when invalid.
pub fn iso_date(timestamp: NormalizedTimestamp) -> String {
    timestamp
        .value()
        .and_then(|value| {
            value
                .checked_to_offset(UtcOffset::UTC)?
                .format(format_description!("[year]-[month]-[day]"))
                .ok()
        })
        .unwrap_or_default()
}

/// Orders timestamps newest first; invalid timestamps sort last.
pub fn compare_desc(left: NormalizedTimestamp, right: NormalizedTimestamp) -> Ordering {
    right.cmp(&left)
}

fn parse_text(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed);
    }

    let naive_formats: [&[BorrowedFormatItem<'_>]; 4] = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ];
    if let Some(parsed) = naive_formats
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, format).ok())
    {
        return Some(parsed.assume_utc());
    }

    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn from_seconds_pair(map: &Map<String, Value>) -> Option<OffsetDateTime> {
    let seconds = map
        .get("seconds")
        .or_else(|| map.get("_seconds"))
        .and_then(whole_number)?;
    let nanos = map
        .get("nanoseconds")
        .or_else(|| map.get("_nanoseconds"))
        .and_then(whole_number)
        .unwrap_or(0);

    let total = seconds.checked_mul(1_000_000_000)?.checked_add(nanos)?;
    OffsetDateTime::from_unix_timestamp_nanos(total).ok()
}

fn from_unix_millis(millis: i128) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
}

fn whole_number(value: &Value) -> Option<i128> {
    match value {
        Value::Number(number) => number.as_i64().map(i128::from).or_else(|| {
            number
                .as_f64()
                .map(f64::trunc)
                .filter(|raw| *raw >= i64::MIN as f64 && *raw < i64::MAX as f64)
                .map(|raw| raw as i128)
        }),
        _ => None,
    }
}
