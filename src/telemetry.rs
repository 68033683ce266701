//! Constellation telemetry source.
//!
//! Fetches the rolling 24-hour window of balloon snapshots, one JSON document
//! per hour. The feed is unreliable by design: hours go missing (404), bodies
//! arrive truncated or with NaN placeholders, and the origin occasionally
//! throws server errors. Every fetch is retried with backoff and parsed
//! leniently; an hour that still cannot be used degrades to `None` rather
//! than failing the window.

use crate::config::config;
use crate::json_repair;
use crate::models::RawSnapshot;
use crate::retry::{with_retry, RetryConfig, RetryError};
use futures::future::join_all;
use serde_json::Value;

/// Hours of history the constellation endpoint keeps.
pub const WINDOW_HOURS: usize = 24;

/// Telemetry source for hourly constellation snapshots.
pub struct TelemetrySource {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl TelemetrySource {
    /// Create a source against the configured constellation endpoint.
    pub fn new() -> Self {
        Self::with_base_url(config().telemetry_base_url.clone())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            retry: RetryConfig::default(),
        }
    }

    /// Build the URL for the snapshot taken `hours_ago` hours ago.
    ///
    /// URL format: `{base}/{hours_ago:02}.json`; `00.json` is the newest.
    pub fn snapshot_url(&self, hours_ago: usize) -> String {
        format!("{}/{:02}.json", self.base_url, hours_ago)
    }

    /// Fetch one hour of telemetry.
    ///
    /// Returns `Some(vec![])` when upstream published nothing for the hour
    /// (404), and `None` when the hour is unusable: transport failure after
    /// retries, a non-list body, or an unrecoverable parse.
    pub async fn fetch_hour(&self, hours_ago: usize) -> Option<RawSnapshot> {
        let url = self.snapshot_url(hours_ago);

        let body = with_retry(
            || async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RetryError::Retryable(e.into()))?;

                match response.status() {
                    reqwest::StatusCode::OK => {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| RetryError::Retryable(e.into()))?;
                        Ok(Some(text))
                    }
                    reqwest::StatusCode::NOT_FOUND => Ok(None),
                    status if status.is_server_error() => Err(RetryError::Retryable(
                        anyhow::anyhow!("Snapshot fetch failed with status: {}", status),
                    )),
                    status => Err(RetryError::NonRetryable(anyhow::anyhow!(
                        "Snapshot fetch failed with status: {}",
                        status
                    ))),
                }
            },
            &self.retry,
        )
        .await;

        match body {
            Ok(Some(text)) => match json_repair::parse_lenient(&text) {
                Some(Value::Array(slots)) => Some(slots),
                Some(_) => {
                    log::warn!("Telemetry body from {} is not a list", url);
                    None
                }
                None => {
                    log::warn!("Unrecoverable telemetry body from {}", url);
                    None
                }
            },
            Ok(None) => {
                log::info!("No snapshot published at {}", url);
                Some(Vec::new())
            }
            Err(err) => {
                log::warn!("Giving up on {}: {}", url, err.into_inner());
                None
            }
        }
    }

    /// Fetch the whole window concurrently, returned oldest hour first.
    pub async fn fetch_window(&self) -> Vec<Option<RawSnapshot>> {
        let fetches = (0..WINDOW_HOURS).map(|hours_ago| self.fetch_hour(hours_ago));
        let mut hours = join_all(fetches).await;
        // Upstream indexes snapshots in hours-ago; repair runs oldest first.
        hours.reverse();
        hours
    }
}

impl Default for TelemetrySource {
    fn default() -> Self {
        Self::new()
    }
}
