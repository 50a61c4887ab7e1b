//! Waypoint down-sampling under the routing engine's hard waypoint limit.

use log::debug;

use crate::{Geometry, WaypointSet};

/// Maximum number of waypoints the navigation engine accepts for one route.
pub const MAX_WAYPOINTS: usize = 25;

/// Reduce a geometry to at most [`MAX_WAYPOINTS`] ordered waypoints.
///
/// Geometries that already fit are returned unchanged. Longer ones keep the
/// first and last point and fill the interior slots with an even index
/// spacing over the whole span, so the tail of the route is represented
/// exactly as well as the head.
///
/// # Example
/// ```
/// use route_fidelity::{Coordinate, Geometry, sample_waypoints};
/// let points: Vec<Coordinate> = (0..100).map(|i| Coordinate::new(0.0, i as f64 * 0.001)).collect();
/// let geometry = Geometry::new(points).unwrap();
/// let waypoints = sample_waypoints(&geometry);
/// assert_eq!(waypoints.len(), 25);
/// assert_eq!(waypoints.last(), Some(&geometry.last()));
/// ```
pub fn sample_waypoints(geometry: &Geometry) -> WaypointSet {
    let points = geometry.points();
    let waypoints: Vec<_> = sample_indices(points.len())
        .into_iter()
        .map(|index| points[index])
        .collect();

    if waypoints.len() < points.len() {
        debug!(
            "[Sampling] Reduced {} points to {} waypoints",
            points.len(),
            waypoints.len()
        );
    }
    WaypointSet::from_sampled(waypoints)
}

/// Indices into the source geometry that [`sample_waypoints`] selects.
pub fn sample_indices(point_count: usize) -> Vec<usize> {
    if point_count <= MAX_WAYPOINTS {
        return (0..point_count).collect();
    }
    let step = (point_count - 1) as f64 / (MAX_WAYPOINTS - 1) as f64;
    std::iter::once(0)
        .chain((1..MAX_WAYPOINTS - 1).map(|i| (i as f64 * step) as usize))
        .chain(std::iter::once(point_count - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;

    fn geometry(n: usize) -> Geometry {
        Geometry::new(
            (0..n)
                .map(|i| Coordinate::new(45.0 + i as f64 * 0.0005, 7.0 + i as f64 * 0.0003))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_when_within_limit() {
        for n in [2, 3, 10, 24, 25] {
            let g = geometry(n);
            assert_eq!(sample_waypoints(&g).as_slice(), g.points(), "n = {}", n);
        }
    }

    #[test]
    fn test_clamps_to_limit_and_keeps_endpoints() {
        for n in [26, 30, 101, 1000, 4321] {
            let g = geometry(n);
            let w = sample_waypoints(&g);
            assert_eq!(w.len(), MAX_WAYPOINTS, "n = {}", n);
            assert_eq!(w.as_slice()[0], g.first());
            assert_eq!(w.as_slice()[MAX_WAYPOINTS - 1], g.last());
        }
    }

    #[test]
    fn test_indices_are_evenly_spaced_and_ordered() {
        // 1000 points: step = 999 / 24 = 41.625
        let indices = sample_indices(1000);
        assert_eq!(indices.len(), MAX_WAYPOINTS);
        assert_eq!(indices[1], 41);
        assert_eq!(indices[12], 499);
        assert_eq!(indices[23], 957);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sample_matches_indices() {
        let g = geometry(60);
        let w = sample_waypoints(&g);
        let expected: Vec<Coordinate> = sample_indices(60).iter().map(|&i| g.points()[i]).collect();
        assert_eq!(w.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_tail_is_represented() {
        // The second-to-last waypoint lies in the final twentieth of the route
        let g = geometry(2000);
        let indices = sample_indices(g.len());
        assert!(indices[MAX_WAYPOINTS - 2] > 1900);
    }
}
