use crate::config::config;
use crate::models::Position;
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CachedWindow {
    #[serde(with = "ts_milliseconds")]
    fetched_at: DateTime<Utc>,
    snapshots: Vec<Vec<Position>>,
}

/// Best-effort disk cache for the repaired snapshot window.
///
/// The upstream feed advances hourly, so a cache stamped within the current
/// UTC hour is fresh and anything older is a miss. The cache never fails a
/// request: unreadable or unwritable state degrades to a miss and a log line.
pub struct WindowStore {
    path: Option<PathBuf>,
}

impl WindowStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_config() -> Self {
        Self::new(config().cache_path.clone())
    }

    /// Cached window, if present and stamped in the current UTC hour.
    pub fn read(&self) -> Option<Vec<Vec<Position>>> {
        self.read_at(Utc::now())
    }

    fn read_at(&self, now: DateTime<Utc>) -> Option<Vec<Vec<Position>>> {
        let path = self.path.as_ref()?;
        let bytes = std::fs::read(path).ok()?;

        let cached: CachedWindow = match serde_json::from_slice(&bytes) {
            Ok(cached) => cached,
            Err(err) => {
                log::warn!(
                    "Ignoring unreadable snapshot cache {}: {}",
                    path.display(),
                    err
                );
                return None;
            }
        };

        if same_utc_hour(cached.fetched_at, now) {
            log::debug!("Snapshot cache hit ({} hours)", cached.snapshots.len());
            Some(cached.snapshots)
        } else {
            log::debug!("Snapshot cache is stale, refetching");
            None
        }
    }

    /// Persist a freshly repaired window. Failures are logged, not raised.
    pub fn write(&self, snapshots: &[Vec<Position>]) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        let cached = CachedWindow {
            fetched_at: Utc::now(),
            snapshots: snapshots.to_vec(),
        };
        let result = serde_json::to_vec(&cached)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));

        if let Err(err) = result {
            log::warn!("Failed to write snapshot cache {}: {}", path.display(), err);
        }
    }
}

fn same_utc_hour(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive() && a.hour() == b.hour()
}
