use crate::cli::ForecastArgs;
use crate::forecast::{append_forecast, ForecastEngine};
use crate::geometry;
use crate::models::TrackPoint;
use crate::snapshots;
use crate::store::WindowStore;
use crate::telemetry::TelemetrySource;

/// Fetch and repair the current snapshot window, printing a per-hour summary.
pub async fn fetch() -> anyhow::Result<()> {
    let telemetry = TelemetrySource::new();
    let store = WindowStore::from_config();

    let window = snapshots::load_window(&telemetry, &store).await?;
    let slots = window.first().map(Vec::len).unwrap_or(0);

    println!("{} hours, {} slots per hour", window.len(), slots);
    for (hour, row) in window.iter().enumerate() {
        let tracked = row.iter().filter(|p| p.is_valid()).count();
        println!("  hour {:02}: {}/{} slots tracked", hour, tracked, row.len());
    }
    Ok(())
}

/// Print a 24-hour drift forecast as JSON, either from an explicit origin or
/// from a balloon slot's last known position (with its history prepended).
pub async fn forecast(args: ForecastArgs) -> anyhow::Result<()> {
    let engine = ForecastEngine::from_config();

    let track = match args.slot {
        Some(slot) => slot_forecast(&engine, slot).await?,
        None => match (args.lat, args.lon) {
            (Some(lat), Some(lon)) => origin_forecast(&engine, lat, lon, args.alt).await?,
            _ => anyhow::bail!("Pass --lat and --lon, or --slot"),
        },
    };

    let track = if args.raw {
        track
    } else {
        geometry::shape(&track)
    };
    println!("{}", serde_json::to_string_pretty(&track)?);
    Ok(())
}

async fn origin_forecast(
    engine: &ForecastEngine,
    lat: f64,
    lon: f64,
    alt: f64,
) -> anyhow::Result<Vec<TrackPoint>> {
    let trajectory = engine
        .forecast(lat, lon, alt)
        .await
        .ok_or_else(|| anyhow::anyhow!("No forecast available for {},{}", lat, lon))?;
    Ok(trajectory.as_ref().clone())
}

async fn slot_forecast(engine: &ForecastEngine, slot: usize) -> anyhow::Result<Vec<TrackPoint>> {
    let telemetry = TelemetrySource::new();
    let store = WindowStore::from_config();
    let window = snapshots::load_window(&telemetry, &store).await?;

    let origin = snapshots::last_known_position(&window, slot)
        .ok_or_else(|| anyhow::anyhow!("Slot {} has no usable history", slot))?;
    let history = snapshots::slot_track(&window, slot);

    let trajectory = engine
        .forecast(origin.latitude, origin.longitude, origin.altitude)
        .await
        .ok_or_else(|| anyhow::anyhow!("No forecast available for slot {}", slot))?;

    Ok(append_forecast(history, &trajectory))
}
