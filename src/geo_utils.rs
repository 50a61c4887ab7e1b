//! Geographic utilities: great-circle distance and path length.

use crate::Coordinate;

/// Earth radius in meters used by every distance in this crate.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters (haversine).
///
/// Symmetric, and zero for identical coordinates.
///
/// # Example
/// ```
/// use route_fidelity::{Coordinate, geo_utils::haversine_distance};
/// let a = Coordinate::new(0.0, 0.0);
/// let b = Coordinate::new(0.0, 1.0);
/// let d = haversine_distance(&a, &b);
/// assert!((d - 111_195.0).abs() < 556.0);
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Sum of consecutive point-to-point distances along a path.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}
