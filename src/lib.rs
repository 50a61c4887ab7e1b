//! # Route Fidelity
//!
//! Keeps turn-by-turn guidance pinned to a caller-supplied route geometry.
//!
//! Navigation engines normally recompute a route between waypoints, which
//! drifts away from the path the caller planned. This library instead:
//! - parses the planned geometry (GeoJSON LineString or encoded polyline)
//! - fabricates a directions response that follows that exact geometry
//! - watches live positions against the geometry with a throttled, edge-triggered monitor
//! - on deviation, re-anchors onto the nearest remaining point of the geometry,
//!   never asking a routing service for a shortest-path detour
//!
//! ## Features
//!
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use route_fidelity::{Coordinate, GuidanceConfig, NavigationSession};
//!
//! let mut session = NavigationSession::new(GuidanceConfig::default());
//! let route = session
//!     .build_route(r#"{"type":"LineString","coordinates":[[-0.1278,51.5074],[-0.1300,51.5090]]}"#, None)
//!     .unwrap();
//! assert_eq!(route.legs.len(), 1);
//!
//! // Feed location updates as they arrive
//! let event = session.on_location_update(Coordinate::new(51.5075, -0.1280), Utc::now());
//! assert!(event.is_none());
//! ```

use geo::Coord;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, RecoveryFailure, Result, RouteError};

// Geographic utilities (distance, path length)
pub mod geo_utils;

// GeoJSON / polyline parsing and serialization
pub mod codec;
pub use codec::{parse_geometry, parse_render_geometry, PolylinePrecision};

// Waypoint down-sampling under the routing-engine limit
pub mod sampling;
pub use sampling::{sample_waypoints, MAX_WAYPOINTS};

// Nearest-point search over a geometry
pub mod nearest;
pub use nearest::{locate_index, match_by_tolerance, nearest_index, nearest_point, NearestPoint};

// Synthetic directions response construction
pub mod directions;
pub use directions::{
    build_synthetic_route, DirectionsParams, DirectionsResponse, RouteLeg, RouteStep, SyntheticRoute,
};

// Off-route state machine
pub mod deviation;
pub use deviation::{DeviationCheck, DeviationMonitor, DeviationState, DeviationTransition};

// Re-anchoring onto the planned geometry
pub mod recovery;
pub use recovery::RecoveryPlanner;

// Route line colour
pub mod color;
pub use color::RouteColor;

// Stateful navigation session (single active session, snapshot state)
pub mod session;
pub use session::{
    is_route_to_start_detour, ActiveGuidance, GuidanceEvent, NavigationSession, SessionState,
};

// Outbound capabilities towards the host plugin / navigation engine
pub mod host;
pub use host::{GuidanceDriver, HostEvent, NavigationHost, RerouteReason};

// Algorithm toolbox - standalone access to the building blocks
pub mod algorithms;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RouteFidelityRust"),
    );
}

/// Initialize logging for iOS (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "ios"))]
pub(crate) fn init_logging() {
    use log::LevelFilter;
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Fails only if another logger is already installed
        let _ = oslog::OsLogger::new("com.routefidelity")
            .level_filter(LevelFilter::Debug)
            .init();
    });
}

#[cfg(all(feature = "ffi", not(any(target_os = "android", target_os = "ios"))))]
pub(crate) fn init_logging() {
    // No-op on desktop platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in degrees.
///
/// # Example
/// ```
/// use route_fidelity::Coordinate;
/// let point = Coordinate::new(51.5074, -0.1278); // London
/// assert!(point.is_finite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite numbers. Range is not checked.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// GeoJSON position order: `[lon, lat]`.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.y, c.x)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(p: Coordinate) -> Self {
        Coord {
            x: p.longitude,
            y: p.latitude,
        }
    }
}

/// The planned path: an ordered, immutable sequence of at least two coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    points: Vec<Coordinate>,
}

impl Geometry {
    /// Minimum number of points a navigable geometry must have.
    pub const MIN_POINTS: usize = 2;

    /// Build a geometry, rejecting fewer than two points or non-finite values.
    pub fn new(points: Vec<Coordinate>) -> Result<Self> {
        if points.len() < Self::MIN_POINTS {
            return Err(RouteError::InsufficientPoints {
                point_count: points.len(),
                minimum_required: Self::MIN_POINTS,
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(RouteError::InvalidCoordinates {
                index,
                message: format!(
                    "({}, {}) is not finite",
                    points[index].latitude, points[index].longitude
                ),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// The suffix starting at `index` (inclusive), which must itself be navigable.
    pub fn suffix_from(&self, index: usize) -> Result<Self> {
        let remaining = self.points.get(index..).unwrap_or_default();
        Self::new(remaining.to_vec())
    }

    /// Length along the path in meters.
    pub fn length_meters(&self) -> f64 {
        geo_utils::polyline_length(&self.points)
    }
}

/// Ordered waypoints drawn from a geometry, at most [`MAX_WAYPOINTS`] long,
/// always containing the geometry's first and last point.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointSet {
    points: Vec<Coordinate>,
}

impl WaypointSet {
    pub(crate) fn from_sampled(points: Vec<Coordinate>) -> Self {
        debug_assert!(points.len() >= 2 && points.len() <= MAX_WAYPOINTS);
        Self { points }
    }

    pub fn as_slice(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Coordinate> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Coordinate> {
        self.points.last()
    }
}

/// Travel profile used for the request URL and the step `mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "kebab-case")]
pub enum NavigationProfile {
    DrivingTraffic,
    Driving,
    Walking,
    Cycling,
}

impl NavigationProfile {
    /// Path segment of the directions request URL.
    pub fn as_path(&self) -> &'static str {
        match self {
            NavigationProfile::DrivingTraffic => "driving-traffic",
            NavigationProfile::Driving => "driving",
            NavigationProfile::Walking => "walking",
            NavigationProfile::Cycling => "cycling",
        }
    }

    /// Value of each step's `mode` field.
    pub fn step_mode(&self) -> &'static str {
        match self {
            NavigationProfile::DrivingTraffic | NavigationProfile::Driving => "driving",
            NavigationProfile::Walking => "walking",
            NavigationProfile::Cycling => "cycling",
        }
    }

    /// Parse the host's `mode` option. Unknown values yield `None`.
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode {
            "driving-traffic" => Some(NavigationProfile::DrivingTraffic),
            "driving" => Some(NavigationProfile::Driving),
            "walking" => Some(NavigationProfile::Walking),
            "cycling" => Some(NavigationProfile::Cycling),
            _ => None,
        }
    }
}

/// Configuration for guidance along a planned geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct GuidanceConfig {
    /// Distance from the planned geometry beyond which the user is off route.
    /// Default: 80.0 meters
    pub off_route_threshold_meters: f64,

    /// Minimum time between two deviation checks.
    /// Default: 3000 ms
    pub check_interval_ms: u64,

    /// Radius around the planned start that counts as arriving there.
    /// Default: 50.0 meters
    pub start_arrival_radius_meters: f64,

    /// Distance from the planned start beyond which a route-to-start detour is built.
    /// Default: 200.0 meters
    pub route_to_start_threshold_meters: f64,

    /// Speed used to derive durations from distances.
    /// Default: 13.89 m/s (~50 km/h)
    pub assumed_speed_mps: f64,

    /// Maximum geometry points per synthetic step.
    /// Default: 50
    pub max_points_per_step: u32,

    /// Half-width of the lat/lng box used to match waypoints onto the geometry (degrees).
    /// Default: 0.0001 (~10 meters at mid-latitudes)
    pub match_tolerance_degrees: f64,

    /// Voice locale written into the synthetic response.
    pub voice_locale: String,

    /// Travel profile.
    pub profile: NavigationProfile,

    /// Base of the directions request URL handed to the navigation engine.
    pub directions_base_url: String,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            off_route_threshold_meters: 80.0,
            check_interval_ms: 3000,
            start_arrival_radius_meters: 50.0,
            route_to_start_threshold_meters: 200.0,
            assumed_speed_mps: 13.89,
            max_points_per_step: 50,
            match_tolerance_degrees: 0.0001,
            voice_locale: "en-US".to_string(),
            profile: NavigationProfile::DrivingTraffic,
            directions_base_url: "https://api.mapbox.com/directions/v5/mapbox".to_string(),
        }
    }
}

impl GuidanceConfig {
    /// Parse a (possibly partial) JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| RouteError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make distances, durations or chunking meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("off_route_threshold_meters", self.off_route_threshold_meters),
            ("start_arrival_radius_meters", self.start_arrival_radius_meters),
            (
                "route_to_start_threshold_meters",
                self.route_to_start_threshold_meters,
            ),
            ("assumed_speed_mps", self.assumed_speed_mps),
            ("match_tolerance_degrees", self.match_tolerance_degrees),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RouteError::ConfigError {
                    message: format!("{} must be a positive number, got {}", name, value),
                });
            }
        }
        if self.max_points_per_step < 2 {
            return Err(RouteError::ConfigError {
                message: format!(
                    "max_points_per_step must be at least 2, got {}",
                    self.max_points_per_step
                ),
            });
        }
        Ok(())
    }

    /// Overlay the options the host actually provided.
    pub fn apply_options(&mut self, options: &GuidanceOptions) {
        if let Some(profile) = options.mode.as_deref().and_then(NavigationProfile::from_mode) {
            self.profile = profile;
        }
        if let Some(language) = &options.language {
            self.voice_locale = language.clone();
        }
        if let Some(threshold) = options.off_route_threshold_meters {
            self.off_route_threshold_meters = threshold;
        }
        if let Some(interval) = options.check_interval_ms {
            self.check_interval_ms = interval;
        }
        if let Some(speed) = options.assumed_speed_mps {
            self.assumed_speed_mps = speed;
        }
    }

    pub(crate) fn directions_params(&self) -> DirectionsParams {
        DirectionsParams {
            speed_mps: self.assumed_speed_mps,
            max_points_per_step: self.max_points_per_step as usize,
            match_tolerance_degrees: self.match_tolerance_degrees,
            voice_locale: self.voice_locale.clone(),
            profile: self.profile,
        }
    }
}

/// Host-provided option overrides. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct GuidanceOptions {
    /// "driving-traffic", "driving", "walking" or "cycling"
    pub mode: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "offRouteThreshold")]
    pub off_route_threshold_meters: Option<f64>,
    pub check_interval_ms: Option<u64>,
    pub assumed_speed_mps: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================
