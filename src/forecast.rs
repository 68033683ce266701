//! Wind-drift forecaster.
//!
//! Integrates hourly wind into a 24-hour trajectory from an origin. Results
//! are cached for the life of the process, keyed by the origin quantized to
//! 0.01°; concurrent misses on the same key share one wind fetch. A failed
//! computation is shared with the callers already waiting on it but never
//! cached, so the next request tries again.

use crate::config::config;
use crate::models::{wrap_longitude, TrackPoint};
use crate::wind::{self, WindObservation, WindSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Forecast horizon in hours.
pub const FORECAST_HOURS: usize = 24;

/// Floor for the meridian-convergence divisor, reached around 89.4° latitude.
const MIN_CONVERGENCE: f64 = 0.01;

/// Forecast origins within the same 0.01° cell share a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_hundredths: i64,
    lon_hundredths: i64,
}

impl CacheKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_hundredths: (lat * 100.0).round() as i64,
            lon_hundredths: (lon * 100.0).round() as i64,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2},{:.2}",
            self.lat_hundredths as f64 / 100.0,
            self.lon_hundredths as f64 / 100.0
        )
    }
}

type SharedTrack = Arc<Vec<TrackPoint>>;

pub struct ForecastEngine {
    wind: Arc<dyn WindSource>,
    drift_factor: f64,
    cache: RwLock<HashMap<CacheKey, SharedTrack>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<OnceCell<Option<SharedTrack>>>>>,
}

impl ForecastEngine {
    pub fn new(wind: Arc<dyn WindSource>, drift_factor: f64) -> Self {
        Self {
            wind,
            drift_factor,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config() -> Self {
        Self::new(wind::from_config(), config().drift_factor)
    }

    /// 24-hour drift trajectory from the origin, or `None` when the origin
    /// is not finite or no wind data can be obtained.
    pub async fn forecast(&self, lat: f64, lon: f64, altitude: f64) -> Option<SharedTrack> {
        // NaN and infinite coordinates saturate the quantization into a real
        // cell's bucket, so they must never reach the cache.
        if !(lat.is_finite() && lon.is_finite() && altitude.is_finite()) {
            log::warn!(
                "Rejecting non-finite forecast origin ({}, {}, {})",
                lat,
                lon,
                altitude
            );
            return None;
        }

        let key = CacheKey::new(lat, lon);

        if let Some(hit) = self.cache.read().await.get(&key) {
            log::debug!("Forecast cache hit for {}", key);
            return Some(hit.clone());
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_init(|| async {
                let trajectory = self.compute(key, lat, lon, altitude).await;
                if let Some(trajectory) = &trajectory {
                    self.cache.write().await.insert(key, trajectory.clone());
                }
                trajectory
            })
            .await
            .clone();

        self.in_flight.lock().await.remove(&key);
        result
    }

    async fn compute(
        &self,
        key: CacheKey,
        lat: f64,
        lon: f64,
        altitude: f64,
    ) -> Option<SharedTrack> {
        let observations = match self.wind.observations(lat, lon, FORECAST_HOURS).await {
            Ok(observations) if !observations.is_empty() => observations,
            Ok(_) => {
                log::warn!("Wind source returned no observations for {}", key);
                return None;
            }
            Err(err) => {
                log::warn!("Wind fetch failed for {}: {:#}", key, err);
                return None;
            }
        };

        Some(Arc::new(drift_path(
            lat,
            lon,
            altitude,
            &observations,
            self.drift_factor,
        )))
    }
}

/// Integrate hourly wind into a path. Point 0 is the origin; each following
/// point applies that hour's observation, reusing the last one when the list
/// runs short. Altitude rides along unchanged.
pub fn drift_path(
    lat: f64,
    lon: f64,
    altitude: f64,
    observations: &[WindObservation],
    drift_factor: f64,
) -> Vec<TrackPoint> {
    let mut path = Vec::with_capacity(FORECAST_HOURS + 1);
    path.push(TrackPoint {
        latitude: lat,
        longitude: lon,
        altitude,
        hour: 0,
        is_forecast: true,
    });

    let mut current_lat = lat;
    let mut current_lon = lon;
    for hour in 1..=FORECAST_HOURS {
        let Some(wind) = observations.get(hour - 1).or_else(|| observations.last()) else {
            break;
        };
        (current_lat, current_lon) = drift_step(current_lat, current_lon, wind, drift_factor);
        path.push(TrackPoint {
            latitude: current_lat,
            longitude: current_lon,
            altitude,
            hour: hour as u32,
            is_forecast: true,
        });
    }
    path
}

/// One hour of drift. Wind direction is where the wind blows from, so the
/// balloon moves along the opposite bearing; east-west steps grow with
/// latitude as meridians converge, clamped near the poles.
fn drift_step(lat: f64, lon: f64, wind: &WindObservation, drift_factor: f64) -> (f64, f64) {
    let bearing = (wind.direction + 180.0).rem_euclid(360.0).to_radians();
    let magnitude = wind.speed * drift_factor;

    let lat_change = magnitude * bearing.cos();
    let convergence = lat.to_radians().cos().max(MIN_CONVERGENCE);
    let lon_change = magnitude * bearing.sin() / convergence;

    let new_lat = (lat + lat_change).clamp(-90.0, 90.0);
    let new_lon = wrap_longitude(lon + lon_change);
    (new_lat, new_lon)
}

/// Splice a forecast onto a balloon's history. The forecast origin repeats
/// the last historical position, so it is dropped; the remaining points are
/// renumbered to continue the history's hours.
pub fn append_forecast(mut history: Vec<TrackPoint>, forecast: &[TrackPoint]) -> Vec<TrackPoint> {
    if history.is_empty() {
        return forecast.to_vec();
    }
    let offset = history.last().map(|p| p.hour).unwrap_or(0);
    history.extend(forecast.iter().skip(1).map(|p| TrackPoint {
        hour: offset + p.hour,
        ..*p
    }));
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn steady_wind(speed: f64, direction: f64) -> Vec<WindObservation> {
        vec![WindObservation {
            time: Utc::now(),
            speed,
            direction,
        }]
    }

    struct ScriptedWind {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedWind {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl WindSource for ScriptedWind {
        async fn observations(
            &self,
            _lat: f64,
            _lon: f64,
            _hours: usize,
        ) -> Result<Vec<WindObservation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                anyhow::bail!("wind api down");
            }
            Ok(steady_wind(10.0, 90.0))
        }
    }

    #[test]
    fn test_east_wind_pushes_west() {
        // Wind from 90° at the equator: longitude strictly west, latitude flat.
        let path = drift_path(0.0, 0.0, 5.0, &steady_wind(10.0, 90.0), 0.036);
        assert!((path[1].longitude - -0.36).abs() < 1e-9);
        assert!(path[1].latitude.abs() < 1e-9);
        assert!(path[24].longitude < path[1].longitude);
    }

    #[test]
    fn test_drift_path_shape() {
        let path = drift_path(10.0, 20.0, 7.5, &steady_wind(5.0, 200.0), 0.036);

        assert_eq!(path.len(), FORECAST_HOURS + 1);
        assert_eq!(path[0].hour, 0);
        assert_eq!(path[24].hour, 24);
        assert_eq!(path[0].latitude, 10.0);
        assert_eq!(path[0].longitude, 20.0);
        assert!(path.iter().all(|p| p.is_forecast));
        assert!(path.iter().all(|p| p.altitude == 7.5));
    }

    #[test]
    fn test_drift_path_is_deterministic() {
        let observations: Vec<WindObservation> = (0..24)
            .map(|i| WindObservation {
                time: Utc::now(),
                speed: 3.0 + i as f64 * 0.5,
                direction: (i as f64 * 37.0) % 360.0,
            })
            .collect();

        let first = drift_path(42.5, -71.1, 12.0, &observations, 0.036);
        let second = drift_path(42.5, -71.1, 12.0, &observations, 0.036);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_observations_give_bare_origin() {
        let path = drift_path(10.0, 20.0, 5.0, &[], 0.036);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].hour, 0);
    }

    #[test]
    fn test_meridians_converge_away_from_equator() {
        // cos(60°) = 0.5, so the same wind covers twice the longitude.
        let equator = drift_path(0.0, 0.0, 5.0, &steady_wind(10.0, 90.0), 0.036);
        let high = drift_path(60.0, 0.0, 5.0, &steady_wind(10.0, 90.0), 0.036);

        let step_equator = equator[1].longitude;
        let step_high = high[1].longitude;
        assert!((step_high / step_equator - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_wraps_across_antimeridian() {
        // Wind from the west pushes east over the antimeridian.
        let path = drift_path(0.0, 179.9, 5.0, &steady_wind(10.0, 270.0), 0.036);
        assert!((path[1].longitude - -179.74).abs() < 1e-9);
    }

    #[test]
    fn test_latitude_clamps_at_the_pole() {
        let path = drift_path(89.9, 0.0, 5.0, &steady_wind(10.0, 180.0), 0.036);
        assert_eq!(path[1].latitude, 90.0);
    }

    #[test]
    fn test_cache_key_quantization() {
        assert_eq!(CacheKey::new(10.123, 20.456), CacheKey::new(10.1249, 20.4551));
        assert_ne!(CacheKey::new(10.12, 20.46), CacheKey::new(10.13, 20.46));
        assert_eq!(CacheKey::new(10.123, -20.456).to_string(), "10.12,-20.46");
    }

    #[tokio::test]
    async fn test_forecast_caches_by_quantized_origin() {
        let wind = Arc::new(ScriptedWind::new(false));
        let engine = ForecastEngine::new(wind.clone(), 0.036);

        let first = engine.forecast(10.0, 20.0, 5.0).await.unwrap();
        let second = engine.forecast(10.0049, 19.9951, 5.0).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(wind.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first[0].altitude, 5.0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let wind = Arc::new(ScriptedWind::new(false));
        let engine = ForecastEngine::new(wind.clone(), 0.036);

        let (a, b) = tokio::join!(
            engine.forecast(10.0, 20.0, 5.0),
            engine.forecast(10.0, 20.0, 5.0)
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(wind.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let wind = Arc::new(ScriptedWind::new(true));
        let engine = ForecastEngine::new(wind.clone(), 0.036);

        assert!(engine.forecast(10.0, 20.0, 5.0).await.is_none());
        assert!(engine.forecast(10.0, 20.0, 5.0).await.is_none());
        // Each request tried upstream again.
        assert_eq!(wind.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_finite_origin_is_rejected() {
        let wind = Arc::new(ScriptedWind::new(false));
        let engine = ForecastEngine::new(wind.clone(), 0.036);

        // (NaN, 20.0) quantizes into the same bucket as (0.0, 20.0).
        assert_eq!(CacheKey::new(f64::NAN, 20.0), CacheKey::new(0.0, 20.0));

        assert!(engine.forecast(f64::NAN, 20.0, 5.0).await.is_none());
        assert!(engine.forecast(0.0, f64::INFINITY, 5.0).await.is_none());
        assert!(engine.forecast(0.0, 20.0, f64::NAN).await.is_none());
        assert_eq!(wind.calls.load(Ordering::SeqCst), 0);

        // The legitimate origin sharing that bucket is served a clean track.
        let track = engine.forecast(0.0, 20.0, 5.0).await.unwrap();
        assert_eq!(track[0].latitude, 0.0);
        assert!(track
            .iter()
            .all(|p| p.latitude.is_finite() && p.longitude.is_finite()));
    }

    #[test]
    fn test_append_forecast_renumbers_hours() {
        let history = vec![
            TrackPoint {
                latitude: 10.0,
                longitude: 20.0,
                altitude: 5.0,
                hour: 22,
                is_forecast: false,
            },
            TrackPoint {
                latitude: 11.0,
                longitude: 21.0,
                altitude: 5.0,
                hour: 23,
                is_forecast: false,
            },
        ];
        let forecast = drift_path(11.0, 21.0, 5.0, &steady_wind(10.0, 90.0), 0.036);

        let merged = append_forecast(history, &forecast);

        assert_eq!(merged.len(), 2 + FORECAST_HOURS);
        assert_eq!(merged[1].hour, 23);
        assert!(!merged[1].is_forecast);
        assert_eq!(merged[2].hour, 24);
        assert!(merged[2].is_forecast);
        assert_eq!(merged.last().unwrap().hour, 23 + 24);
    }

    #[test]
    fn test_append_forecast_to_empty_history() {
        let forecast = drift_path(0.0, 0.0, 5.0, &steady_wind(10.0, 90.0), 0.036);
        let merged = append_forecast(Vec::new(), &forecast);
        assert_eq!(merged.len(), forecast.len());
        assert_eq!(merged[0].hour, 0);
    }
}
