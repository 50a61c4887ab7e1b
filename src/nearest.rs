//! Nearest-point search over a geometry's vertices.
//!
//! Two policies are provided:
//! - [`nearest_index`]: exact linear scan by great-circle distance
//! - [`match_by_tolerance`]: first vertex inside an axis-aligned lat/lng box
//!
//! The tolerance box is a cheap approximation (~10 m at mid-latitudes for the
//! default 0.0001°). Longitude degrees shrink towards the poles and there is
//! no antimeridian wraparound, so the box is wider than intended at high
//! latitudes and never matches across ±180°.
//!
//! On dense geometry, where several vertices fall inside one box, the match
//! is the first of them in geometry order. A waypoint can then anchor onto an
//! earlier vertex than the one it was sampled from, so a later leg may be
//! cut from the wrong slice or fall back to a straight step.

use crate::geo_utils::haversine_distance;
use crate::{Coordinate, Geometry};

/// Closest vertex of a geometry to some position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub index: usize,
    pub point: Coordinate,
    pub distance_meters: f64,
}

/// Index of the vertex closest to `target`. Ties resolve to the lowest index.
///
/// Returns `None` only for an empty slice.
pub fn nearest_index(target: &Coordinate, points: &[Coordinate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = haversine_distance(target, point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Index of the first vertex within `tolerance_degrees` of `target` in both
/// latitude and longitude.
pub fn match_by_tolerance(
    target: &Coordinate,
    points: &[Coordinate],
    tolerance_degrees: f64,
) -> Option<usize> {
    points.iter().position(|p| {
        (p.latitude - target.latitude).abs() < tolerance_degrees
            && (p.longitude - target.longitude).abs() < tolerance_degrees
    })
}

/// Matching policy used to anchor waypoints onto a geometry: tolerance box
/// first, nearest vertex otherwise.
pub fn locate_index(
    target: &Coordinate,
    points: &[Coordinate],
    tolerance_degrees: f64,
) -> Option<usize> {
    match_by_tolerance(target, points, tolerance_degrees).or_else(|| nearest_index(target, points))
}

/// Closest vertex of a geometry, with its distance.
pub fn nearest_point(target: &Coordinate, geometry: &Geometry) -> NearestPoint {
    let points = geometry.points();
    // A geometry always has at least two points
    let index = nearest_index(target, points).unwrap_or(0);
    NearestPoint {
        index,
        point: points[index],
        distance_meters: haversine_distance(target, &points[index]),
    }
}

impl Geometry {
    /// Distance in meters from `position` to the closest vertex.
    pub fn distance_to(&self, position: &Coordinate) -> f64 {
        nearest_point(position, self).distance_meters
    }
}
