//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings used by the Kotlin and Swift
//! plugin halves. Guidance runs against one process-wide driver; routes and
//! events reach the platform through a registered
//! [`NavigationEventListener`].
//!
//! Listener methods are called while the guidance lock is held and must not
//! call back into `guidance_*` functions synchronously.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;

use crate::{
    init_logging, parse_geometry, parse_render_geometry, Coordinate, GuidanceConfig, GuidanceDriver,
    GuidanceEvent, GuidanceOptions, HostEvent, NavigationHost, NavigationSession,
    PolylinePrecision, RouteColor, RouteError, SyntheticRoute,
};

// ============================================================================
// Listener Interface
// ============================================================================

/// Implement this in Kotlin/Swift to receive routes and events.
#[uniffi::export(callback_interface)]
pub trait NavigationEventListener: Send + Sync {
    /// A synthetic route must be handed to the navigation engine.
    /// - directions_json: directions response to start guidance on
    /// - request_url: request URL the engine pairs with that response
    /// - route_color: `#RRGGBB` (or `#AARRGGBB`) line colour
    fn on_route_ready(&self, directions_json: String, request_url: String, route_color: String);

    /// An event for the plugin's event channel.
    fn on_event(&self, name: String, payload_json: String);
}

/// Adapts the platform listener to [`NavigationHost`].
pub struct ListenerHost {
    listener: Option<Box<dyn NavigationEventListener>>,
    directions_base_url: String,
}

impl ListenerHost {
    fn new(directions_base_url: String) -> Self {
        Self {
            listener: None,
            directions_base_url,
        }
    }
}

impl NavigationHost for ListenerHost {
    fn install_route(&self, route: &SyntheticRoute, color: &RouteColor) {
        let Some(listener) = &self.listener else {
            warn!("[Guidance] No listener registered, route {} not delivered", route.uuid);
            return;
        };
        match route.to_json() {
            Ok(json) => listener.on_route_ready(
                json,
                route.request_url(&self.directions_base_url),
                color.to_hex(),
            ),
            Err(err) => warn!("[Guidance] Could not serialize route {}: {}", route.uuid, err),
        }
    }

    fn emit_event(&self, event: &HostEvent) {
        debug!("[Guidance] Event {}", event.name());
        if let Some(listener) = &self.listener {
            listener.on_event(event.name().to_string(), event.payload_json());
        }
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

static GUIDANCE: Lazy<Mutex<GuidanceDriver<ListenerHost>>> = Lazy::new(|| {
    let config = GuidanceConfig::default();
    let host = ListenerHost::new(config.directions_base_url.clone());
    Mutex::new(GuidanceDriver::new(NavigationSession::new(config), host))
});

/// Run `f` against the global guidance driver. A poisoned lock is recovered.
pub fn with_guidance<F, R>(f: F) -> R
where
    F: FnOnce(&mut GuidanceDriver<ListenerHost>) -> R,
{
    let mut driver = GUIDANCE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut driver)
}

fn timestamp(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(|| {
        warn!("[Guidance] Timestamp {} out of range, using current time", timestamp_ms);
        Utc::now()
    })
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initialize logging (call once at plugin startup).
#[uniffi::export]
pub fn guidance_init() {
    init_logging();
    info!("[Guidance] Initialized");
}

#[uniffi::export]
pub fn guidance_register_listener(listener: Box<dyn NavigationEventListener>) {
    with_guidance(|d| d.host_mut().listener = Some(listener));
    info!("[Guidance] Listener registered");
}

#[uniffi::export]
pub fn guidance_unregister_listener() {
    with_guidance(|d| d.host_mut().listener = None);
}

// ============================================================================
// Configuration
// ============================================================================

#[uniffi::export]
pub fn guidance_set_config(config: GuidanceConfig) -> Result<(), RouteError> {
    with_guidance(|d| {
        let base_url = config.directions_base_url.clone();
        d.session_mut().set_config(config)?;
        d.host_mut().directions_base_url = base_url;
        Ok(())
    })
}

/// Set the configuration from a (possibly partial) JSON object.
#[uniffi::export]
pub fn guidance_set_config_json(json: String) -> Result<(), RouteError> {
    guidance_set_config(GuidanceConfig::from_json(&json)?)
}

/// Overlay host options (`mode`, `language`, `offRouteThreshold`, ...).
#[uniffi::export]
pub fn guidance_apply_options(options: GuidanceOptions) -> Result<(), RouteError> {
    with_guidance(|d| d.session_mut().apply_options(&options))
}

#[uniffi::export]
pub fn guidance_get_config() -> GuidanceConfig {
    with_guidance(|d| d.session().config().clone())
}

// ============================================================================
// Guidance
// ============================================================================

/// Build and install a route along `geometry` (GeoJSON LineString or
/// precision-5 polyline). Returns the directions JSON that was installed.
#[uniffi::export]
pub fn guidance_build_route(
    geometry: String,
    route_color: Option<String>,
) -> Result<String, RouteError> {
    info!("[Guidance] guidance_build_route called ({} bytes)", geometry.len());
    with_guidance(|d| d.build_route(&geometry, route_color.as_deref())?.to_json())
}

/// Feed a location update. Returns the name of the event it produced, if any.
#[uniffi::export]
pub fn guidance_on_location_update(latitude: f64, longitude: f64, timestamp_ms: i64) -> Option<String> {
    let position = Coordinate::new(latitude, longitude);
    let now = timestamp(timestamp_ms);
    with_guidance(|d| d.on_location_update(position, now)).map(|event| {
        match event {
            GuidanceEvent::OffRouteEntered { .. } => "user_off_route",
            GuidanceEvent::OffRouteCleared { .. } => "off_route_cleared",
            GuidanceEvent::ArrivedAtStart { .. } => "arrived_at_start",
        }
        .to_string()
    })
}

/// The navigation engine reported the user off route. Returns the recovered
/// directions JSON; on error the previous route stays installed.
#[uniffi::export]
pub fn guidance_on_upstream_off_route() -> Result<String, RouteError> {
    with_guidance(|d| d.on_upstream_off_route()?.to_json())
}

#[uniffi::export]
pub fn guidance_on_arrival() {
    with_guidance(|d| d.on_arrival());
}

#[uniffi::export]
pub fn guidance_cancel() {
    with_guidance(|d| d.cancel());
}

#[uniffi::export]
pub fn guidance_clear() {
    with_guidance(|d| d.clear());
}

#[uniffi::export]
pub fn guidance_start_free_drive() {
    with_guidance(|d| d.start_free_drive());
}

// ============================================================================
// Queries
// ============================================================================

#[uniffi::export]
pub fn guidance_is_off_route() -> bool {
    with_guidance(|d| {
        d.session()
            .active_guidance()
            .is_some_and(|active| active.deviation.is_off_route)
    })
}

#[uniffi::export]
pub fn guidance_last_position() -> Option<Coordinate> {
    with_guidance(|d| d.session().last_position())
}

/// Directions JSON of the installed route.
#[uniffi::export]
pub fn guidance_active_route_json() -> Result<Option<String>, RouteError> {
    with_guidance(|d| d.session().active_route().map(|route| route.to_json()).transpose())
}

// ============================================================================
// Geometry Helpers
// ============================================================================

/// Encode route geometry as the precision-6 polyline used by the planned-route layer.
#[uniffi::export]
pub fn encode_render_polyline(geometry: String) -> Result<String, RouteError> {
    parse_geometry(&geometry)?.to_polyline(PolylinePrecision::Six)
}

/// Decode planned-route layer geometry (GeoJSON or precision-6 polyline).
#[uniffi::export]
pub fn decode_render_geometry(raw: String) -> Result<Vec<Coordinate>, RouteError> {
    Ok(parse_render_geometry(&raw)?.points().to_vec())
}

/// Normalize route geometry to a GeoJSON LineString.
#[uniffi::export]
pub fn geometry_to_geojson(geometry: String) -> Result<String, RouteError> {
    Ok(parse_geometry(&geometry)?.to_geojson())
}
