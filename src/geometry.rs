//! Track shaping for presentation: densify hourly vertices with linear
//! interpolation, then smooth with a centered moving average. Pure functions,
//! applied on the way out of the API.

use crate::models::{wrap_longitude, TrackPoint};

/// Intermediate points inserted between consecutive hourly vertices.
pub const INTERMEDIATE_POINTS: usize = 5;

/// Moving-average window used by [`smooth`].
pub const SMOOTHING_WINDOW: usize = 3;

/// Segments spanning more than this many degrees of latitude or longitude
/// are treated as data discontinuities and left unbridged.
pub const MAX_SEGMENT_DEGREES: f64 = 45.0;

/// Standard presentation pass: densify, then smooth.
pub fn shape(points: &[TrackPoint]) -> Vec<TrackPoint> {
    smooth(
        &interpolate(points, INTERMEDIATE_POINTS, MAX_SEGMENT_DEGREES),
        SMOOTHING_WINDOW,
    )
}

/// Insert `intermediate` evenly spaced points into every segment, taking the
/// shortest path in longitude across the antimeridian. Segments wider than
/// `max_gap` degrees in latitude or wrapped longitude pass through untouched.
pub fn interpolate(points: &[TrackPoint], intermediate: usize, max_gap: f64) -> Vec<TrackPoint> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let mut result = Vec::with_capacity(points.len() + intermediate * (points.len() - 1));

    for pair in points.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        result.push(current);

        let lat_gap = (next.latitude - current.latitude).abs();
        if lat_gap > max_gap || lon_distance(current, next) > max_gap {
            continue;
        }

        for j in 1..=intermediate {
            let t = j as f64 / (intermediate + 1) as f64;
            result.push(lerp_point(current, next, t));
        }
    }

    if let Some(last) = points.last() {
        result.push(*last);
    }
    result
}

/// Centered moving average over latitude, longitude, and altitude. The first
/// and last points are anchored; every interior point keeps its own hour and
/// forecast flag. Sequences shorter than the window are returned unchanged.
pub fn smooth(points: &[TrackPoint], window: usize) -> Vec<TrackPoint> {
    if points.len() < 2 || points.len() < window {
        return points.to_vec();
    }

    let mut result = Vec::with_capacity(points.len());
    result.push(points[0]);

    let half = window / 2;
    for i in 1..points.len() - 1 {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(points.len());
        let span = &points[start..end];
        let n = span.len() as f64;

        result.push(TrackPoint {
            latitude: span.iter().map(|p| p.latitude).sum::<f64>() / n,
            longitude: span.iter().map(|p| p.longitude).sum::<f64>() / n,
            altitude: span.iter().map(|p| p.altitude).sum::<f64>() / n,
            hour: points[i].hour,
            is_forecast: points[i].is_forecast,
        });
    }

    result.push(points[points.len() - 1]);
    result
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

fn lerp_point(start: TrackPoint, end: TrackPoint, t: f64) -> TrackPoint {
    // Take the short way around the antimeridian.
    let mut start_lon = start.longitude;
    let mut end_lon = end.longitude;
    if (end_lon - start_lon).abs() > 180.0 {
        if end_lon > start_lon {
            start_lon += 360.0;
        } else {
            end_lon += 360.0;
        }
    }

    TrackPoint {
        latitude: lerp(start.latitude, end.latitude, t),
        longitude: wrap_longitude(lerp(start_lon, end_lon, t)),
        altitude: lerp(start.altitude, end.altitude, t),
        hour: lerp(start.hour as f64, end.hour as f64, t).floor() as u32,
        is_forecast: start.is_forecast,
    }
}

/// Longitude distance between two points, accounting for the wrap.
fn lon_distance(a: TrackPoint, b: TrackPoint) -> f64 {
    let delta = b.longitude - a.longitude;
    delta.abs().min((delta + 360.0).abs()).min((delta - 360.0).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, alt: f64, hour: u32, is_forecast: bool) -> TrackPoint {
        TrackPoint {
            latitude: lat,
            longitude: lon,
            altitude: alt,
            hour,
            is_forecast,
        }
    }

    #[test]
    fn test_interpolate_inserts_points() {
        let track = vec![
            point(0.0, 0.0, 0.0, 0, true),
            point(0.0, 6.0, 6.0, 1, true),
        ];
        let dense = interpolate(&track, 5, MAX_SEGMENT_DEGREES);

        assert_eq!(dense.len(), 7);
        assert_eq!(dense[0], track[0]);
        assert_eq!(dense[6], track[1]);

        // t = 1/6 for the first inserted point.
        assert!((dense[1].longitude - 1.0).abs() < 1e-9);
        assert!((dense[1].altitude - 1.0).abs() < 1e-9);
        // Fractional hours floor toward the earlier vertex.
        assert_eq!(dense[1].hour, 0);
        assert_eq!(dense[3].hour, 0);
        assert!(dense[3].is_forecast);
    }

    #[test]
    fn test_interpolate_short_input_unchanged() {
        let one = vec![point(1.0, 2.0, 3.0, 0, false)];
        assert_eq!(interpolate(&one, 5, MAX_SEGMENT_DEGREES), one);
        assert!(interpolate(&[], 5, MAX_SEGMENT_DEGREES).is_empty());
    }

    #[test]
    fn test_interpolate_crosses_antimeridian_short_way() {
        let track = vec![
            point(0.0, 170.0, 0.0, 0, true),
            point(0.0, -170.0, 0.0, 1, true),
        ];
        let dense = interpolate(&track, 3, MAX_SEGMENT_DEGREES);

        assert_eq!(dense.len(), 5);
        assert!((dense[1].longitude - 175.0).abs() < 1e-9);
        assert!((dense[2].longitude - -180.0).abs() < 1e-9);
        assert!((dense[3].longitude - -175.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_leaves_wide_gaps_unbridged() {
        let jump_lat = vec![
            point(0.0, 0.0, 0.0, 0, false),
            point(50.0, 0.0, 0.0, 1, false),
        ];
        assert_eq!(interpolate(&jump_lat, 5, MAX_SEGMENT_DEGREES).len(), 2);

        let jump_lon = vec![
            point(0.0, 0.0, 0.0, 0, false),
            point(0.0, 100.0, 0.0, 1, false),
        ];
        assert_eq!(interpolate(&jump_lon, 5, MAX_SEGMENT_DEGREES).len(), 2);

        // 170 -> -170 is only 20 degrees once wrapped, so it does bridge.
        let wrapped = vec![
            point(0.0, 170.0, 0.0, 0, false),
            point(0.0, -170.0, 0.0, 1, false),
        ];
        assert_eq!(interpolate(&wrapped, 5, MAX_SEGMENT_DEGREES).len(), 7);
    }

    #[test]
    fn test_smooth_anchors_endpoints() {
        let track = vec![
            point(0.0, 0.0, 0.0, 0, false),
            point(30.0, 3.0, 9.0, 1, true),
            point(0.0, 0.0, 0.0, 2, false),
        ];
        let smoothed = smooth(&track, 3);

        assert_eq!(smoothed.len(), 3);
        assert_eq!(smoothed[0], track[0]);
        assert_eq!(smoothed[2], track[2]);

        assert!((smoothed[1].latitude - 10.0).abs() < 1e-9);
        assert!((smoothed[1].longitude - 1.0).abs() < 1e-9);
        assert!((smoothed[1].altitude - 3.0).abs() < 1e-9);
        // The center point keeps its own hour and forecast flag.
        assert_eq!(smoothed[1].hour, 1);
        assert!(smoothed[1].is_forecast);
    }

    #[test]
    fn test_smooth_short_input_unchanged() {
        let track = vec![
            point(0.0, 0.0, 0.0, 0, false),
            point(10.0, 10.0, 0.0, 1, false),
        ];
        assert_eq!(smooth(&track, 3), track);
    }

    #[test]
    fn test_shape_keeps_endpoints() {
        let track = vec![
            point(0.0, 0.0, 5.0, 0, true),
            point(1.0, 1.0, 5.0, 1, true),
            point(2.0, 0.0, 5.0, 2, true),
        ];
        let shaped = shape(&track);

        assert_eq!(shaped.len(), 13);
        assert_eq!(shaped[0], track[0]);
        assert_eq!(shaped[shaped.len() - 1], track[2]);
    }
}
