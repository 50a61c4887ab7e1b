//! Outbound capabilities towards the host plugin and navigation engine.
//!
//! The session only computes; a [`GuidanceDriver`] pairs it with a
//! [`NavigationHost`] that can install routes and relay events. Event names
//! are the host's channel names and payloads are JSON objects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::{json, Value};

use crate::{Coordinate, GuidanceEvent, NavigationSession, Result, RouteColor, SyntheticRoute};

/// What the navigation engine side must be able to do for us.
pub trait NavigationHost {
    /// Start (or continue) active guidance on `route`, replacing any previous one.
    fn install_route(&self, route: &SyntheticRoute, color: &RouteColor);

    /// Relay an event to the host's event channel.
    fn emit_event(&self, event: &HostEvent);
}

/// Why a route was replaced while guiding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteReason {
    Recovery,
    ArrivedAtStart,
}

impl RerouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerouteReason::Recovery => "recovery",
            RerouteReason::ArrivedAtStart => "arrived_at_start",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    RouteBuilt {
        route_id: String,
        waypoint_count: usize,
        distance_meters: f64,
        duration_seconds: f64,
        route_to_start: bool,
    },
    RouteBuildFailed {
        message: String,
    },
    NavigationRunning,
    /// From the local monitor (with measurements) or the navigation engine (without)
    UserOffRoute {
        distance_meters: Option<f64>,
        threshold_meters: Option<f64>,
        position: Option<Coordinate>,
    },
    OffRouteCleared {
        distance_meters: f64,
    },
    RerouteAlong {
        route_id: String,
        reason: RerouteReason,
    },
    ArrivedAtStart {
        distance_to_start: f64,
    },
    RecoveryFailed {
        message: String,
    },
    OnArrival,
    NavigationCancelled,
}

impl HostEvent {
    /// Channel name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::RouteBuilt { .. } => "route_built",
            HostEvent::RouteBuildFailed { .. } => "route_build_failed",
            HostEvent::NavigationRunning => "navigation_running",
            HostEvent::UserOffRoute { .. } => "user_off_route",
            HostEvent::OffRouteCleared { .. } => "off_route_cleared",
            HostEvent::RerouteAlong { .. } => "reroute_along",
            HostEvent::ArrivedAtStart { .. } => "arrived_at_start",
            HostEvent::RecoveryFailed { .. } => "recovery_failed",
            HostEvent::OnArrival => "on_arrival",
            HostEvent::NavigationCancelled => "navigation_cancelled",
        }
    }

    /// Event data as a JSON object (empty for data-less events).
    pub fn payload(&self) -> Value {
        match self {
            HostEvent::RouteBuilt {
                route_id,
                waypoint_count,
                distance_meters,
                duration_seconds,
                route_to_start,
            } => json!({
                "routeId": route_id,
                "waypointCount": waypoint_count,
                "distance": distance_meters,
                "duration": duration_seconds,
                "routeToStart": route_to_start,
            }),
            HostEvent::RouteBuildFailed { message } | HostEvent::RecoveryFailed { message } => {
                json!({ "message": message })
            }
            HostEvent::UserOffRoute {
                distance_meters,
                threshold_meters,
                position,
            } => {
                let mut data = json!({
                    "distance": distance_meters,
                    "threshold": threshold_meters,
                });
                if let Some(position) = position {
                    data["latitude"] = json!(position.latitude);
                    data["longitude"] = json!(position.longitude);
                }
                data
            }
            HostEvent::OffRouteCleared { distance_meters } => json!({ "distance": distance_meters }),
            HostEvent::RerouteAlong { route_id, reason } => json!({
                "routeId": route_id,
                "reason": reason.as_str(),
            }),
            HostEvent::ArrivedAtStart { distance_to_start } => {
                json!({ "distanceToStart": distance_to_start })
            }
            HostEvent::NavigationRunning | HostEvent::OnArrival | HostEvent::NavigationCancelled => {
                json!({})
            }
        }
    }

    pub fn payload_json(&self) -> String {
        self.payload().to_string()
    }
}

/// Drives a [`NavigationSession`] and forwards its outcomes to a host.
pub struct GuidanceDriver<H: NavigationHost> {
    session: NavigationSession,
    host: H,
}

impl<H: NavigationHost> GuidanceDriver<H> {
    pub fn new(session: NavigationSession, host: H) -> Self {
        Self { session, host }
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut NavigationSession {
        &mut self.session
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn install(&self, route: &SyntheticRoute) {
        let color = self
            .session
            .active_guidance()
            .map(|active| active.color)
            .unwrap_or_default();
        self.host.install_route(route, &color);
    }

    /// Build and install a route; failures are reported to the host too.
    pub fn build_route(&mut self, raw: &str, color: Option<&str>) -> Result<Arc<SyntheticRoute>> {
        match self.session.build_route(raw, color) {
            Ok(route) => {
                self.install(&route);
                self.host.emit_event(&HostEvent::RouteBuilt {
                    route_id: route.uuid.clone(),
                    waypoint_count: route.waypoints.len(),
                    distance_meters: route.distance,
                    duration_seconds: route.duration,
                    route_to_start: self
                        .session
                        .active_guidance()
                        .is_some_and(|active| !active.start_reached),
                });
                self.host.emit_event(&HostEvent::NavigationRunning);
                Ok(route)
            }
            Err(err) => {
                warn!("[Guidance] Route build failed: {}", err);
                self.host.emit_event(&HostEvent::RouteBuildFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub fn on_location_update(
        &mut self,
        position: Coordinate,
        now: DateTime<Utc>,
    ) -> Option<GuidanceEvent> {
        let event = self.session.on_location_update(position, now)?;
        match &event {
            GuidanceEvent::OffRouteEntered {
                distance_meters,
                threshold_meters,
                position,
            } => self.host.emit_event(&HostEvent::UserOffRoute {
                distance_meters: Some(*distance_meters),
                threshold_meters: Some(*threshold_meters),
                position: Some(*position),
            }),
            GuidanceEvent::OffRouteCleared { distance_meters } => {
                self.host.emit_event(&HostEvent::OffRouteCleared {
                    distance_meters: *distance_meters,
                })
            }
            GuidanceEvent::ArrivedAtStart {
                distance_to_start,
                route,
            } => {
                self.install(route);
                self.host.emit_event(&HostEvent::ArrivedAtStart {
                    distance_to_start: *distance_to_start,
                });
                self.host.emit_event(&HostEvent::RerouteAlong {
                    route_id: route.uuid.clone(),
                    reason: RerouteReason::ArrivedAtStart,
                });
            }
        }
        Some(event)
    }

    /// The navigation engine detected a deviation; always attempt recovery
    /// onto the planned geometry.
    pub fn on_upstream_off_route(&mut self) -> Result<Arc<SyntheticRoute>> {
        self.host.emit_event(&HostEvent::UserOffRoute {
            distance_meters: None,
            threshold_meters: None,
            position: None,
        });
        match self.session.on_upstream_off_route() {
            Ok(route) => {
                self.install(&route);
                self.host.emit_event(&HostEvent::RerouteAlong {
                    route_id: route.uuid.clone(),
                    reason: RerouteReason::Recovery,
                });
                Ok(route)
            }
            Err(err) => {
                warn!("[Recovery] Keeping current route: {}", err);
                self.host.emit_event(&HostEvent::RecoveryFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Final destination reached.
    pub fn on_arrival(&mut self) {
        info!("[Guidance] Arrived at destination");
        self.host.emit_event(&HostEvent::OnArrival);
    }

    /// End the session at the user's request.
    pub fn cancel(&mut self) {
        self.session.clear();
        self.host.emit_event(&HostEvent::NavigationCancelled);
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    pub fn start_free_drive(&mut self) {
        self.session.start_free_drive();
    }
}
