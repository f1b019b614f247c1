//! Domain types shared across the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Race types ────────────────────────────────────────────────────────

/// A geographic point, treated as an opaque identity key.
///
/// Two locations are the same only if both fields match exactly as strings;
/// there is no numeric tolerance. `45.0` and `45.00` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub lat: String,
    pub lon: String,
}

impl Location {
    pub fn new(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            lat: lat.into(),
            lon: lon.into(),
        }
    }
}

/// One scheduled event needing forecast coverage.
///
/// Invariant: `start < end`, both in the future at creation/update time
/// (enforced by `validate`, not by this type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceWindow {
    pub id: i64,
    pub name: String,
    pub location: Location,
    /// Storage key of the location row this race references.
    pub location_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ── Forecast types ────────────────────────────────────────────────────

/// One filtered forecast row for a location.
///
/// At most one stored row exists per `(location, forecast_time)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub forecast_time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub rain_3h: f64,
    pub snow_3h: f64,
    pub condition_icon: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_identity_is_exact_string_match() {
        let a = Location::new("45.0", "15.0");
        let b = Location::new("45.0", "15.0");
        let c = Location::new("45.00", "15.0");
        assert_eq!(a, b);
        assert_ne!(a, c, "no numeric tolerance: 45.0 != 45.00");
    }
}
