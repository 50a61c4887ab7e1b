//! Synthetic directions responses.
//!
//! The navigation engine only guides along routes that arrive as a directions
//! response. To make it follow a caller-supplied geometry instead of a
//! recomputed one, we fabricate that response ourselves: one leg per pair of
//! consecutive waypoints, each leg split into steps that carry the actual
//! geometry between the two waypoints.
//!
//! ## Wire shape
//!
//! ```text
//! { "routes": [{ "geometry": <LineString>, "distance", "duration", "weight",
//!                "weight_name": "routability", "legs": [...], "voiceLocale" }],
//!   "waypoints": [{ "location": [lon, lat], "name": "" }],
//!   "code": "Ok", "uuid": <v4> }
//! ```

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::LineStringJson;
use crate::geo_utils::{haversine_distance, polyline_length};
use crate::nearest::locate_index;
use crate::{Coordinate, Geometry, NavigationProfile, Result, WaypointSet};

/// Every synthetic step uses this maneuver type.
pub const MANEUVER_TYPE: &str = "turn";

/// Parameters for building a synthetic route.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsParams {
    /// Speed used to turn distances into durations (m/s)
    pub speed_mps: f64,
    /// Maximum geometry points per step (at least 2)
    pub max_points_per_step: usize,
    /// Tolerance box used to match waypoints onto the geometry (degrees)
    pub match_tolerance_degrees: f64,
    pub voice_locale: String,
    pub profile: NavigationProfile,
}

impl Default for DirectionsParams {
    fn default() -> Self {
        crate::GuidanceConfig::default().directions_params()
    }
}

/// One step of a synthetic leg.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Length along `geometry` in meters
    pub distance: f64,
    /// Seconds at the assumed speed
    pub duration: f64,
    /// Geometry fragment covered by this step
    pub geometry: Vec<Coordinate>,
    /// Where the step's maneuver is placed (the fragment's first point)
    pub maneuver_location: Coordinate,
    /// True when the leg could not be matched onto the geometry and this
    /// step connects the two waypoints directly.
    pub straight_line: bool,
}

/// One leg between two consecutive waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    /// Great-circle distance between the leg's waypoints in meters
    pub distance: f64,
    pub duration: f64,
    pub steps: Vec<RouteStep>,
}

/// A fabricated directions response pinned to a planned geometry.
///
/// Immutable: rebuilds produce a new value that replaces the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRoute {
    pub uuid: String,
    /// Geometry the route follows (the full plan, a suffix, or a detour)
    pub geometry: Arc<Geometry>,
    pub waypoints: WaypointSet,
    /// Sum of leg distances in meters
    pub distance: f64,
    pub duration: f64,
    pub legs: Vec<RouteLeg>,
    pub voice_locale: String,
    pub profile: NavigationProfile,
}

/// Build a synthetic route along `geometry` through `waypoints`.
///
/// Each leg's waypoints are located on the geometry (tolerance box first,
/// nearest vertex otherwise) and the slice between them is split into steps
/// of at most `max_points_per_step` points. A leg whose waypoints cannot be
/// placed in order falls back to a single straight step; the build itself
/// never fails.
pub fn build_synthetic_route(
    geometry: Arc<Geometry>,
    waypoints: WaypointSet,
    params: &DirectionsParams,
) -> SyntheticRoute {
    let legs: Vec<RouteLeg> = waypoints
        .as_slice()
        .windows(2)
        .map(|pair| build_leg(&pair[0], &pair[1], geometry.points(), params))
        .collect();

    let distance: f64 = legs.iter().map(|leg| leg.distance).sum();
    let duration = distance / params.speed_mps;

    let route = SyntheticRoute {
        uuid: Uuid::new_v4().to_string(),
        geometry,
        waypoints,
        distance,
        duration,
        legs,
        voice_locale: params.voice_locale.clone(),
        profile: params.profile,
    };

    info!(
        "[Directions] Built route {} with {} waypoints, {} legs, {:.0}m, {:.0}s",
        route.uuid,
        route.waypoints.len(),
        route.legs.len(),
        route.distance,
        route.duration
    );
    route
}

fn build_leg(
    start: &Coordinate,
    end: &Coordinate,
    points: &[Coordinate],
    params: &DirectionsParams,
) -> RouteLeg {
    let distance = haversine_distance(start, end);
    RouteLeg {
        distance,
        duration: distance / params.speed_mps,
        steps: steps_for_leg(start, end, points, params),
    }
}

fn steps_for_leg(
    start: &Coordinate,
    end: &Coordinate,
    points: &[Coordinate],
    params: &DirectionsParams,
) -> Vec<RouteStep> {
    let start_index = locate_index(start, points, params.match_tolerance_degrees);
    let end_index = locate_index(end, points, params.match_tolerance_degrees);

    match (start_index, end_index) {
        (Some(s), Some(e)) if s < e => chunk_steps(&points[s..=e], params),
        _ => {
            warn!(
                "[Directions] Could not place leg on geometry (start={:?}, end={:?}), using straight step",
                start_index, end_index
            );
            vec![straight_step(start, end, params)]
        }
    }
}

/// Split a leg's slice into steps of at most `max_points_per_step` points.
/// Consecutive steps share their boundary point.
fn chunk_steps(slice: &[Coordinate], params: &DirectionsParams) -> Vec<RouteStep> {
    let max_points = params.max_points_per_step.max(2);
    let mut steps = Vec::with_capacity(slice.len() / (max_points - 1) + 1);

    let mut i = 0;
    while i + 1 < slice.len() {
        let end = (i + max_points - 1).min(slice.len() - 1);
        let chunk = &slice[i..=end];
        let distance = polyline_length(chunk);
        steps.push(RouteStep {
            distance,
            duration: distance / params.speed_mps,
            geometry: chunk.to_vec(),
            maneuver_location: chunk[0],
            straight_line: false,
        });
        i = end;
    }

    steps
}

fn straight_step(start: &Coordinate, end: &Coordinate, params: &DirectionsParams) -> RouteStep {
    let distance = haversine_distance(start, end);
    RouteStep {
        distance,
        duration: distance / params.speed_mps,
        geometry: vec![*start, *end],
        maneuver_location: *start,
        straight_line: true,
    }
}

impl SyntheticRoute {
    /// Number of steps that fell back to a straight line.
    pub fn straight_step_count(&self) -> usize {
        self.legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .filter(|step| step.straight_line)
            .count()
    }

    /// Request URL the navigation engine pairs with a pre-built response.
    pub fn request_url(&self, base_url: &str) -> String {
        let coordinates = self
            .waypoints
            .as_slice()
            .iter()
            .map(|p| format!("{},{}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/{}/{}?alternatives=false&geometries=geojson&steps=true&overview=full",
            base_url.trim_end_matches('/'),
            self.profile.as_path(),
            coordinates
        )
    }

    /// Wire representation.
    pub fn to_directions_response(&self) -> DirectionsResponse {
        let mode = self.profile.step_mode();
        let legs = self
            .legs
            .iter()
            .map(|leg| DirectionsLeg {
                distance: leg.distance,
                duration: leg.duration,
                summary: String::new(),
                steps: leg
                    .steps
                    .iter()
                    .map(|step| DirectionsStep {
                        distance: step.distance,
                        duration: step.duration,
                        geometry: LineStringJson::from_points(&step.geometry),
                        name: String::new(),
                        mode: mode.to_string(),
                        maneuver: DirectionsManeuver {
                            kind: MANEUVER_TYPE.to_string(),
                            location: step.maneuver_location.lon_lat(),
                        },
                    })
                    .collect(),
            })
            .collect();

        DirectionsResponse {
            routes: vec![DirectionsRoute {
                geometry: LineStringJson::from_points(self.geometry.points()),
                distance: self.distance,
                duration: self.duration,
                weight: self.duration,
                weight_name: "routability".to_string(),
                legs,
                voice_locale: self.voice_locale.clone(),
            }],
            waypoints: self
                .waypoints
                .as_slice()
                .iter()
                .map(|p| DirectionsWaypoint {
                    location: p.lon_lat(),
                    name: String::new(),
                })
                .collect(),
            code: "Ok".to_string(),
            uuid: self.uuid.clone(),
        }
    }

    /// Directions response as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_directions_response())?)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResponse {
    pub routes: Vec<DirectionsRoute>,
    pub waypoints: Vec<DirectionsWaypoint>,
    pub code: String,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRoute {
    pub geometry: LineStringJson,
    pub distance: f64,
    pub duration: f64,
    pub weight: f64,
    pub weight_name: String,
    pub legs: Vec<DirectionsLeg>,
    #[serde(rename = "voiceLocale")]
    pub voice_locale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsLeg {
    pub distance: f64,
    pub duration: f64,
    pub summary: String,
    pub steps: Vec<DirectionsStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsStep {
    pub distance: f64,
    pub duration: f64,
    pub geometry: LineStringJson,
    pub name: String,
    pub mode: String,
    pub maneuver: DirectionsManeuver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsManeuver {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsWaypoint {
    pub location: [f64; 2],
    pub name: String,
}
