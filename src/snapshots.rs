//! Snapshot repair pipeline.
//!
//! Turns the raw, hole-riddled hourly feed into a dense fixed-width grid:
//! one row per hour (oldest first), one column per balloon slot. Slots keep
//! their column for the whole window, so a column can be read as one
//! balloon's history. Missing or unusable readings are patched from the most
//! recent repaired value for that slot; slots with no history yet hold the
//! `[0, 0, 0]` sentinel.

use crate::models::{Position, RawSnapshot, TrackPoint};
use crate::store::WindowStore;
use crate::telemetry::{TelemetrySource, WINDOW_HOURS};
use anyhow::Result;
use serde_json::Value;

/// Repaired window: `window[hour][slot]`, every row the same length.
pub type RepairedWindow = Vec<Vec<Position>>;

/// Produce the repaired window: the disk cache when fresh, otherwise fetch,
/// repair, and cache. Fails only when not a single hour yields any data.
pub async fn load_window(
    telemetry: &TelemetrySource,
    store: &WindowStore,
) -> Result<RepairedWindow> {
    if let Some(window) = store.read() {
        return Ok(window);
    }

    let hours = telemetry.fetch_window().await;
    let window = repair_window(&hours);

    if window.iter().all(|row| row.is_empty()) {
        anyhow::bail!("No usable telemetry in the last {} hours", WINDOW_HOURS);
    }

    store.write(&window);
    Ok(window)
}

/// Repair a window of raw hours (oldest first).
///
/// Each hour starts from the carried state of the previous one: an absent
/// hour freezes the fleet in place, a short hour keeps the missing tail
/// slots where they were, and an unusable slot keeps its prior value. After
/// the pass every row is padded to the widest row with sentinels, so slots
/// that appear mid-window still occupy their column in earlier hours.
pub fn repair_window(hours: &[Option<RawSnapshot>]) -> RepairedWindow {
    let mut carry: Vec<Position> = Vec::new();
    let mut rows: Vec<Vec<Position>> = Vec::with_capacity(hours.len());

    for raw_hour in hours {
        let row: Vec<Position> = match raw_hour {
            Some(slots) => {
                let width = slots.len().max(carry.len());
                (0..width)
                    .map(|i| repair_slot(slots.get(i), carry.get(i).copied()))
                    .collect()
            }
            None => carry.clone(),
        };
        carry.clone_from(&row);
        rows.push(row);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, Position::SENTINEL);
    }
    rows
}

/// Repair one slot: decode, patch NaN components from the carried value,
/// then adopt the reading only if it is valid. Anything else keeps the
/// carried value, or the sentinel for a slot with no history.
fn repair_slot(raw: Option<&Value>, carried: Option<Position>) -> Position {
    match raw.and_then(decode_slot) {
        Some(position) => {
            let sanitized = position.sanitize(carried);
            if sanitized.is_valid() {
                sanitized
            } else {
                carried.unwrap_or(Position::SENTINEL)
            }
        }
        None => carried.unwrap_or(Position::SENTINEL),
    }
}

/// Decode a raw slot into a position. `null` components (NaN placeholders in
/// the original body) come through as NaN so the sanitizer can patch them;
/// anything that is not a three-number list is undecodable.
fn decode_slot(value: &Value) -> Option<Position> {
    let parts = value.as_array()?;
    if parts.len() != 3 {
        return None;
    }

    let mut triple = [0.0f64; 3];
    for (i, part) in parts.iter().enumerate() {
        triple[i] = match part {
            Value::Null => f64::NAN,
            Value::Number(n) => n.as_f64()?,
            _ => return None,
        };
    }
    Some(Position::from(triple))
}

/// One slot's history across the window, oldest hour first. Hours before the
/// slot's first valid reading are skipped; after that the carry keeps the
/// slot valid, so the returned hours are contiguous.
pub fn slot_track(window: &[Vec<Position>], slot: usize) -> Vec<TrackPoint> {
    window
        .iter()
        .enumerate()
        .filter_map(|(hour, row)| {
            row.get(slot)
                .filter(|p| p.is_valid())
                .map(|p| TrackPoint::historical(*p, hour as u32))
        })
        .collect()
}

/// Latest usable reading for a slot, or `None` when it never reported.
pub fn last_known_position(window: &[Vec<Position>], slot: usize) -> Option<Position> {
    window
        .iter()
        .rev()
        .find_map(|row| row.get(slot).copied().filter(Position::is_valid))
}
