use serde::{Deserialize, Serialize};

/// One hour of telemetry as fetched: per-slot values still in raw JSON form,
/// before any repair has been applied.
pub type RawSnapshot = Vec<serde_json::Value>;

/// One balloon reading. On the wire this is a bare `[latitude, longitude, altitude]`
/// triple, so the struct round-trips through that representation.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Position {
    /// Placeholder for a slot with no usable reading yet.
    pub const SENTINEL: Position = Position {
        latitude: 0.0,
        longitude: 0.0,
        altitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// A usable reading: all three components finite and not exactly the sentinel.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude.is_finite()
            && *self != Self::SENTINEL
    }

    /// Replace NaN components with the matching component of `fallback`
    /// (zero when there is no fallback). Finite components pass through, so
    /// sanitizing twice gives the same result as sanitizing once.
    pub fn sanitize(mut self, fallback: Option<Position>) -> Position {
        let fallback = fallback.unwrap_or(Self::SENTINEL);
        if self.latitude.is_nan() {
            self.latitude = fallback.latitude;
        }
        if self.longitude.is_nan() {
            self.longitude = fallback.longitude;
        }
        if self.altitude.is_nan() {
            self.altitude = fallback.altitude;
        }
        self
    }
}

impl From<[f64; 3]> for Position {
    fn from(triple: [f64; 3]) -> Self {
        Self {
            latitude: triple[0],
            longitude: triple[1],
            altitude: triple[2],
        }
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.latitude, p.longitude, p.altitude]
    }
}

/// One vertex of a balloon trajectory, historical or forecast.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Hour offset from the start of the track.
    pub hour: u32,
    pub is_forecast: bool,
}

impl TrackPoint {
    pub fn historical(position: Position, hour: u32) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            altitude: position.altitude,
            hour,
            is_forecast: false,
        }
    }
}

/// Wrap a longitude into [-180, 180).
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
