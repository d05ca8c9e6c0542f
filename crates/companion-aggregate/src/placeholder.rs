//! Deterministic placeholder telemetry for entities without a fix.
//!
//! Values come from the SHA-256 digest of the entity id. The mapping is
//! stable across runs and platforms, so an entity without data renders in
//! the same spot every time. It is not meant to hide anything.

use companion_core::Coordinates;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Centre of the placeholder area (Johannesburg).
pub const PLACEHOLDER_CENTER: Coordinates = Coordinates {
    lat: -26.2041,
    lng: 28.0473,
};

/// Maximum offset from [`PLACEHOLDER_CENTER`] on each axis, in degrees.
pub const PLACEHOLDER_SPREAD_DEGREES: f64 = 0.05;

const SIGNAL_LEVELS: [&str; 3] = ["Good", "Fair", "Poor"];

/// Hash-derived stand-in values for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceholderTelemetry {
    /// Position within the placeholder area.
    pub coordinates: Coordinates,
    /// Battery percentage in `0..100`.
    pub battery: u8,
    /// One of `Good`, `Fair`, `Poor`.
    pub signal: &'static str,
    /// Hex of the first eight digest bytes.
    pub seed: String,
}

/// Position shown on the map, flagged when it is a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionFix {
    /// Position to render.
    pub coordinates: Coordinates,
    /// `true` when no real fix exists.
    pub approximate: bool,
}

/// Derives placeholder values for `entity_id`.
pub fn placeholder_telemetry(entity_id: &str) -> PlaceholderTelemetry {
    let digest = Sha256::digest(entity_id.as_bytes());
    let word = |offset: usize| {
        u32::from_be_bytes([
            digest[offset],
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ])
    };

    PlaceholderTelemetry {
        coordinates: Coordinates {
            lat: PLACEHOLDER_CENTER.lat + spread(word(0)),
            lng: PLACEHOLDER_CENTER.lng + spread(word(4)),
        },
        battery: (word(8) % 100) as u8,
        signal: SIGNAL_LEVELS[(word(12) % 3) as usize],
        seed: hex::encode(&digest[..8]),
    }
}

/// Returns `fix` when present, otherwise the entity's placeholder position.
pub fn position_or_placeholder(entity_id: &str, fix: Option<Coordinates>) -> PositionFix {
    match fix {
        Some(coordinates) => PositionFix {
            coordinates,
            approximate: false,
        },
        None => PositionFix {
            coordinates: placeholder_telemetry(entity_id).coordinates,
            approximate: true,
        },
    }
}

// Maps a word onto [-spread, +spread].
fn spread(word: u32) -> f64 {
    (f64::from(word) / f64::from(u32::MAX)) * 2.0 * PLACEHOLDER_SPREAD_DEGREES
        - PLACEHOLDER_SPREAD_DEGREES
}
