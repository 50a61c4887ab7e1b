//! Re-anchoring a deviated user onto the remaining planned geometry.
//!
//! Recovery never asks a routing service for a path. It finds the planned
//! vertex nearest to the user, keeps the geometry from that vertex onwards,
//! and fabricates a fresh synthetic route along that suffix.

use std::sync::Arc;

use log::{info, warn};

use crate::directions::{build_synthetic_route, DirectionsParams};
use crate::nearest::nearest_point;
use crate::sampling::sample_waypoints;
use crate::{Coordinate, Geometry, GuidanceConfig, RecoveryFailure, Result, RouteError, SyntheticRoute};

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPlanner {
    params: DirectionsParams,
}

impl RecoveryPlanner {
    pub fn new(params: DirectionsParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &GuidanceConfig) -> Self {
        Self::new(config.directions_params())
    }

    /// Build a route along the suffix of `planned` that starts at the vertex
    /// nearest to `position`.
    ///
    /// Fails with [`RecoveryFailure::SuffixTooShort`] when that vertex is the
    /// last one, since a single point cannot be navigated.
    pub fn plan(&self, planned: &Geometry, position: &Coordinate) -> Result<SyntheticRoute> {
        let anchor = nearest_point(position, planned);
        let remaining = planned.len() - anchor.index;

        let suffix = planned.suffix_from(anchor.index).map_err(|_| {
            warn!(
                "[Recovery] Nearest point is index {} of {}, only {} point(s) remain",
                anchor.index,
                planned.len(),
                remaining
            );
            RouteError::RecoveryImpossible {
                reason: RecoveryFailure::SuffixTooShort {
                    remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
                },
            }
        })?;

        info!(
            "[Recovery] Re-anchoring at index {} ({:.0}m away), {} of {} points remain",
            anchor.index,
            anchor.distance_meters,
            suffix.len(),
            planned.len()
        );

        let waypoints = sample_waypoints(&suffix);
        Ok(build_synthetic_route(Arc::new(suffix), waypoints, &self.params))
    }
}

impl Default for RecoveryPlanner {
    fn default() -> Self {
        Self::new(DirectionsParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_points() -> Geometry {
        Geometry::new((0..10).map(|i| Coordinate::new(45.0, 7.0 + i as f64 * 0.002)).collect()).unwrap()
    }

    #[test]
    fn test_recovery_anchors_at_nearest_vertex() {
        let geometry = ten_points();
        // 30 m south of vertex 6
        let position = Coordinate::new(44.99973, 7.012);
        let route = RecoveryPlanner::default().plan(&geometry, &position).unwrap();

        assert_eq!(route.waypoints.first(), Some(&geometry.points()[6]));
        assert_eq!(route.waypoints.last(), Some(&geometry.points()[9]));
        assert_eq!(route.waypoints.len(), 4);
        assert_eq!(route.legs.len(), 3);
        assert_eq!(route.geometry.len(), 4);
    }

    #[test]
    fn test_recovery_from_second_to_last_vertex() {
        let geometry = ten_points();
        let route = RecoveryPlanner::default()
            .plan(&geometry, &geometry.points()[8])
            .unwrap();
        assert_eq!(route.waypoints.len(), 2);
        assert_eq!(route.legs.len(), 1);
    }

    #[test]
    fn test_recovery_past_the_end_is_impossible() {
        let geometry = ten_points();
        let beyond = Coordinate::new(45.0, 7.5);
        let err = RecoveryPlanner::default().plan(&geometry, &beyond).unwrap_err();
        assert_eq!(
            err,
            RouteError::RecoveryImpossible {
                reason: RecoveryFailure::SuffixTooShort { remaining: 1 }
            }
        );
    }

    #[test]
    fn test_recovery_keeps_fidelity_on_long_suffix() {
        let geometry =
            Geometry::new((0..400).map(|i| Coordinate::new(45.0, 7.0 + i as f64 * 0.0005)).collect()).unwrap();
        let position = Coordinate::new(45.001, 7.05);
        let route = RecoveryPlanner::default().plan(&geometry, &position).unwrap();

        // Nearest vertex is index 100; the suffix keeps all 300 remaining points
        assert_eq!(route.geometry.len(), 300);
        assert_eq!(route.waypoints.len(), 25);
        assert_eq!(route.waypoints.first(), Some(&geometry.points()[100]));
        assert_eq!(route.straight_step_count(), 0);
    }
}
