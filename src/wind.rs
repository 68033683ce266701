use crate::config::config;
use crate::retry::{with_retry, RetryConfig, RetryError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

/// One hourly wind observation. Direction follows the meteorological
/// convention: degrees the wind blows from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindObservation {
    pub time: DateTime<Utc>,
    /// Speed in m/s.
    pub speed: f64,
    /// Degrees the wind blows from.
    pub direction: f64,
}

/// Hourly wind provider for a forecast origin.
#[async_trait]
pub trait WindSource: Send + Sync {
    /// Up to `hours` observations for the origin, in chronological order.
    async fn observations(&self, lat: f64, lon: f64, hours: usize)
        -> Result<Vec<WindObservation>>;
}

/// Pick the wind source the configuration calls for.
pub fn from_config() -> Arc<dyn WindSource> {
    let cfg = config();
    match (&cfg.weather_api_key, cfg.use_synthetic_wind) {
        (Some(key), false) => Arc::new(OwmSource::new(
            cfg.weather_api_url.clone(),
            key.clone(),
        )),
        (_, true) => {
            log::info!("Synthetic wind source forced by configuration");
            Arc::new(SyntheticSource)
        }
        (None, false) => {
            log::info!("No wind API key configured, falling back to synthetic wind");
            Arc::new(SyntheticSource)
        }
    }
}

/// OpenWeatherMap-compatible forecast client.
pub struct OwmSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl OwmSource {
    pub fn new(api_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url,
            api_key,
            retry: RetryConfig::default(),
        }
    }

    fn forecast_url(&self, lat: f64, lon: f64, hours: usize) -> String {
        format!(
            "{}?lat={}&lon={}&appid={}&cnt={}",
            self.api_url, lat, lon, self.api_key, hours
        )
    }
}

#[async_trait]
impl WindSource for OwmSource {
    async fn observations(
        &self,
        lat: f64,
        lon: f64,
        hours: usize,
    ) -> Result<Vec<WindObservation>> {
        let url = self.forecast_url(lat, lon, hours);

        let body = with_retry(
            || async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RetryError::Retryable(e.into()))?;

                match response.status() {
                    reqwest::StatusCode::OK => response
                        .text()
                        .await
                        .map_err(|e| RetryError::Retryable(e.into())),
                    status if status.is_server_error() => Err(RetryError::Retryable(
                        anyhow::anyhow!("Wind fetch failed with status: {}", status),
                    )),
                    status => Err(RetryError::NonRetryable(anyhow::anyhow!(
                        "Wind fetch failed with status: {}",
                        status
                    ))),
                }
            },
            &self.retry,
        )
        .await
        .map_err(RetryError::into_inner)?;

        let parsed: ForecastResponse = serde_json::from_str(&body)?;
        Ok(collect_observations(parsed, hours))
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    #[serde(default)]
    wind: WindRecord,
}

#[derive(Debug, Default, Deserialize)]
struct WindRecord {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

fn collect_observations(response: ForecastResponse, hours: usize) -> Vec<WindObservation> {
    let mut observations: Vec<WindObservation> = response
        .list
        .into_iter()
        .filter_map(|entry| {
            let time = DateTime::from_timestamp(entry.dt, 0)?;
            Some(WindObservation {
                time,
                speed: entry.wind.speed,
                direction: entry.wind.deg,
            })
        })
        .collect();
    observations.sort_by_key(|o| o.time);
    observations.truncate(hours);
    observations
}

/// Random-walk wind for running without an API key: speed drifts by at most
/// ±1 m/s per hour inside [2, 20], direction by at most ±10° per hour.
pub struct SyntheticSource;

#[async_trait]
impl WindSource for SyntheticSource {
    async fn observations(
        &self,
        _lat: f64,
        _lon: f64,
        hours: usize,
    ) -> Result<Vec<WindObservation>> {
        let mut rng = rand::rng();
        let now = Utc::now();
        let mut speed: f64 = rng.random_range(5.0..15.0);
        let mut direction: f64 = rng.random_range(0.0..360.0);

        let mut observations = Vec::with_capacity(hours);
        for i in 0..hours {
            speed = (speed + rng.random_range(-1.0..=1.0)).clamp(2.0, 20.0);
            direction = (direction + rng.random_range(-10.0..=10.0)).rem_euclid(360.0);
            observations.push(WindObservation {
                time: now + TimeDelta::hours(i as i64),
                speed,
                direction,
            });
        }
        Ok(observations)
    }
}
