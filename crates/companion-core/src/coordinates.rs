//! Coordinate extraction across historical field-naming conventions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::value_as_f64;

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, within [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, within [-180, 180].
    pub lng: f64,
}

impl Coordinates {
    /// Creates coordinates when both values are finite and in range.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let in_range = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        in_range.then_some(Self { lat, lng })
    }
}

const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_KEYS: [&str; 2] = ["longitude", "lng"];

/// Extracts coordinates from a document.
///
/// Looks at the nested `data` object first (current mobile schema), then a
/// nested `location` object, then top-level fields. Each level accepts
/// `latitude`/`lat` and `longitude`/`lng`, as numbers or numeric strings.
/// Returns `None` when no level holds a complete, in-range pair.
pub fn normalize_coordinates(fields: &Map<String, Value>) -> Option<Coordinates> {
    for nested in ["data", "location"] {
        if let Some(Value::Object(inner)) = fields.get(nested)
            && let Some(coordinates) = read_pair(inner)
        {
            return Some(coordinates);
        }
    }

    read_pair(fields)
}

fn read_pair(fields: &Map<String, Value>) -> Option<Coordinates> {
    let lat = first_number(fields, &LATITUDE_KEYS)?;
    let lng = first_number(fields, &LONGITUDE_KEYS)?;
    Coordinates::new(lat, lng)
}

fn first_number(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(value_as_f64))
}
