//! # Algorithm Toolbox
//!
//! Direct access to the building blocks behind [`NavigationSession`](crate::NavigationSession).
//! Use these to fabricate or inspect synthetic routes without running a session.
//!
//! ## Building Blocks
//!
//! - **Geometry Codec**: GeoJSON LineString and encoded polyline (precision 5 or 6)
//! - **Waypoint Sampling**: even index spacing under the 25-waypoint limit
//! - **Nearest-Point Search**: exact scan and tolerance-box matching
//! - **Synthetic Directions**: legs and chunked steps along a fixed geometry
//! - **Deviation Monitor**: throttled, edge-triggered off-route detection
//! - **Recovery Planner**: re-anchoring onto the remaining geometry
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use route_fidelity::algorithms::{
//!     build_synthetic_route, parse_geometry, sample_waypoints, DirectionsParams,
//! };
//!
//! let geometry = parse_geometry(r#"{"type":"LineString","coordinates":[[0.0,0.0],[0.01,0.0],[0.02,0.0]]}"#).unwrap();
//! let waypoints = sample_waypoints(&geometry);
//! let route = build_synthetic_route(Arc::new(geometry), waypoints, &DirectionsParams::default());
//! assert_eq!(route.legs.len(), 2);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Coordinate, Geometry, GuidanceConfig, NavigationProfile, WaypointSet};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{haversine_distance, polyline_length, EARTH_RADIUS_METERS};

// =============================================================================
// Geometry Codec
// =============================================================================

pub use crate::codec::{
    decode_polyline, parse_geometry, parse_render_geometry, to_geojson, PolylinePrecision,
};

// =============================================================================
// Sampling and Matching
// =============================================================================

pub use crate::sampling::{sample_indices, sample_waypoints, MAX_WAYPOINTS};

pub use crate::nearest::{locate_index, match_by_tolerance, nearest_index, nearest_point, NearestPoint};

// =============================================================================
// Synthetic Directions
// =============================================================================

pub use crate::directions::{build_synthetic_route, DirectionsParams, SyntheticRoute, MANEUVER_TYPE};

// =============================================================================
// Deviation and Recovery
// =============================================================================

pub use crate::deviation::{DeviationCheck, DeviationMonitor, DeviationState, DeviationTransition};

pub use crate::recovery::RecoveryPlanner;
