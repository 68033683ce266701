use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Constellation endpoint serving hourly snapshots at `{base}/{hours_ago:02}.json`.
    #[serde(default = "default_telemetry_base_url")]
    pub telemetry_base_url: String,
    /// Hourly wind forecast endpoint (OpenWeatherMap-compatible).
    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,
    /// API key for the wind endpoint. Without one the synthetic source is used.
    pub weather_api_key: Option<String>,
    /// Force the synthetic wind source even when a key is configured.
    #[serde(default)]
    pub use_synthetic_wind: bool,
    /// Where to cache the repaired snapshot window. No caching when unset.
    pub cache_path: Option<PathBuf>,
    /// Degrees of drift per hour per m/s of wind. A display calibration
    /// constant, not physics: 0.036 moves a balloon visibly across a globe
    /// render over 24 hours of moderate wind.
    #[serde(default = "default_drift_factor")]
    pub drift_factor: f64,
}

fn default_telemetry_base_url() -> String {
    "https://a.windbornesystems.com/treasure".to_string()
}

fn default_weather_api_url() -> String {
    "https://api.openweathermap.org/data/2.5/forecast".to_string()
}

fn default_drift_factor() -> f64 {
    0.036
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    envy::prefixed("ALOFT_")
        .from_env::<Config>()
        .expect("Invalid ALOFT_* config. Optional env vars: ALOFT_TELEMETRY_BASE_URL, ALOFT_WEATHER_API_URL, ALOFT_WEATHER_API_KEY, ALOFT_USE_SYNTHETIC_WIND, ALOFT_CACHE_PATH, ALOFT_DRIFT_FACTOR")
});

pub fn config() -> &'static Config {
    &CONFIG
}
