//! # Navigation Session
//!
//! The single stateful piece of the library. A session owns the planned
//! geometry, the synthetic route currently installed in the navigation
//! engine, and the deviation state, all held in one [`SessionState`] value
//! that is replaced wholesale on every transition.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──build_route──▶ Guiding ──clear──▶ Idle
//!   │                     │ ▲
//!   └─start_free_drive─▶ FreeDrive   (recovery / start switch stay in Guiding)
//! ```
//!
//! Inbound events are processed one at a time to completion. The session does
//! no I/O; installing routes and emitting events is left to the caller (see
//! [`GuidanceDriver`](crate::GuidanceDriver)).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::directions::build_synthetic_route;
use crate::geo_utils::haversine_distance;
use crate::{
    parse_geometry, sample_waypoints, Coordinate, DeviationCheck, DeviationMonitor,
    DeviationState, DeviationTransition, Geometry, GuidanceConfig, GuidanceOptions, OptionExt,
    RecoveryFailure, RecoveryPlanner, Result, RouteColor, RouteError, SyntheticRoute,
};

/// Whether `route` is a two-waypoint detour leading to the planned start.
///
/// The signal is the waypoint count alone, so a planned geometry of exactly
/// two points looks like a detour too. Sessions track whether the start has
/// been reached separately and only consult this for routes they built as
/// detours.
pub fn is_route_to_start_detour(route: &SyntheticRoute) -> bool {
    route.waypoints.len() == 2
}

/// Everything installed while guiding along a planned geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGuidance {
    /// Full caller-supplied geometry; never truncated
    pub planned: Arc<Geometry>,
    /// Route currently installed in the navigation engine
    pub route: Arc<SyntheticRoute>,
    pub color: RouteColor,
    pub deviation: DeviationState,
    /// True once guidance follows the planned geometry itself rather than a
    /// route-to-start detour.
    pub start_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Position tracking only, no planned geometry
    FreeDrive,
    Guiding(ActiveGuidance),
}

/// Outcome of a location update that the host must act on.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEvent {
    OffRouteEntered {
        distance_meters: f64,
        threshold_meters: f64,
        position: Coordinate,
    },
    OffRouteCleared {
        distance_meters: f64,
    },
    /// The user reached the planned start during a detour; `route` follows
    /// the planned geometry and replaces the detour.
    ArrivedAtStart {
        distance_to_start: f64,
        route: Arc<SyntheticRoute>,
    },
}

pub struct NavigationSession {
    config: GuidanceConfig,
    monitor: DeviationMonitor,
    recovery: RecoveryPlanner,
    state: SessionState,
    // Sensor state; survives clear()
    last_position: Option<Coordinate>,
}

impl NavigationSession {
    pub fn new(config: GuidanceConfig) -> Self {
        Self {
            monitor: DeviationMonitor::from_config(&config),
            recovery: RecoveryPlanner::from_config(&config),
            config,
            state: SessionState::Idle,
            last_position: None,
        }
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect for the next build; an
    /// installed route is not rebuilt.
    pub fn set_config(&mut self, config: GuidanceConfig) -> Result<()> {
        config.validate()?;
        self.monitor = DeviationMonitor::from_config(&config);
        self.recovery = RecoveryPlanner::from_config(&config);
        self.config = config;
        Ok(())
    }

    /// Overlay host options onto the current configuration.
    pub fn apply_options(&mut self, options: &GuidanceOptions) -> Result<()> {
        let mut config = self.config.clone();
        config.apply_options(options);
        self.set_config(config)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_position(&self) -> Option<Coordinate> {
        self.last_position
    }

    pub fn active_guidance(&self) -> Option<&ActiveGuidance> {
        match &self.state {
            SessionState::Guiding(active) => Some(active),
            _ => None,
        }
    }

    pub fn active_route(&self) -> Option<&Arc<SyntheticRoute>> {
        self.active_guidance().map(|active| &active.route)
    }

    pub fn planned_geometry(&self) -> Option<&Arc<Geometry>> {
        self.active_guidance().map(|active| &active.planned)
    }

    pub fn is_free_drive(&self) -> bool {
        matches!(self.state, SessionState::FreeDrive)
    }

    /// Parse `raw` and install a synthetic route along it.
    ///
    /// When the last known position is further than
    /// `route_to_start_threshold_meters` from the geometry's first point, the
    /// installed route is a straight detour to that point; the switch to the
    /// planned geometry happens on arrival. On error the previous state is
    /// kept unchanged.
    pub fn build_route(&mut self, raw: &str, color: Option<&str>) -> Result<Arc<SyntheticRoute>> {
        let planned = Arc::new(parse_geometry(raw)?);
        let color = RouteColor::parse_or_default(color);
        let params = self.config.directions_params();

        let detour_from = self.last_position.filter(|position| {
            haversine_distance(position, &planned.first()) > self.config.route_to_start_threshold_meters
        });

        let (route, start_reached) = match detour_from {
            Some(position) => {
                let detour = Geometry::new(vec![position, planned.first()])?;
                info!(
                    "[Guidance] {:.0}m from planned start, building route to start",
                    haversine_distance(&position, &planned.first())
                );
                let waypoints = sample_waypoints(&detour);
                (build_synthetic_route(Arc::new(detour), waypoints, &params), false)
            }
            None => {
                let waypoints = sample_waypoints(&planned);
                (build_synthetic_route(planned.clone(), waypoints, &params), true)
            }
        };

        let route = Arc::new(route);
        info!(
            "[Guidance] Installed route {} ({} planned points, color {})",
            route.uuid,
            planned.len(),
            color
        );
        self.state = SessionState::Guiding(ActiveGuidance {
            planned,
            route: route.clone(),
            color,
            deviation: DeviationState::default(),
            start_reached,
        });
        Ok(route)
    }

    /// Feed a live position.
    ///
    /// The position is always recorded. While guiding, throttled samples
    /// return immediately; allowed samples first check arrival at the
    /// planned start (detour only), then the distance to the planned geometry.
    pub fn on_location_update(
        &mut self,
        position: Coordinate,
        now: DateTime<Utc>,
    ) -> Option<GuidanceEvent> {
        if !position.is_finite() {
            warn!("[Guidance] Ignoring non-finite position {:?}", position);
            return None;
        }
        self.last_position = Some(position);

        let active = match &self.state {
            SessionState::Guiding(active) => active,
            _ => return None,
        };

        if self.monitor.is_throttled(&active.deviation, now) {
            return None;
        }

        if !active.start_reached && is_route_to_start_detour(&active.route) {
            let distance_to_start = haversine_distance(&position, &active.planned.first());
            if distance_to_start < self.config.start_arrival_radius_meters {
                info!(
                    "[Guidance] Arrived at planned start ({:.0}m), switching to planned route",
                    distance_to_start
                );
                let waypoints = sample_waypoints(&active.planned);
                let route = Arc::new(build_synthetic_route(
                    active.planned.clone(),
                    waypoints,
                    &self.config.directions_params(),
                ));
                self.state = SessionState::Guiding(ActiveGuidance {
                    route: route.clone(),
                    deviation: DeviationState::default(),
                    start_reached: true,
                    ..active.clone()
                });
                return Some(GuidanceEvent::ArrivedAtStart {
                    distance_to_start,
                    route,
                });
            }
        }

        let (deviation, transition) =
            match self.monitor.check(&active.deviation, &active.planned, &position, now) {
                DeviationCheck::Throttled => return None,
                DeviationCheck::Sampled { state, transition } => (state, transition),
            };

        let event = transition.map(|transition| match transition {
            DeviationTransition::Entered => GuidanceEvent::OffRouteEntered {
                distance_meters: deviation.last_distance_to_route,
                threshold_meters: self.monitor.threshold_meters(),
                position,
            },
            DeviationTransition::Cleared => GuidanceEvent::OffRouteCleared {
                distance_meters: deviation.last_distance_to_route,
            },
        });

        self.state = SessionState::Guiding(ActiveGuidance {
            deviation,
            ..active.clone()
        });
        event
    }

    /// The navigation engine reported the user off route: re-anchor onto the
    /// planned geometry at the vertex nearest the last known position.
    ///
    /// On failure the installed route stays in place.
    pub fn on_upstream_off_route(&mut self) -> Result<Arc<SyntheticRoute>> {
        let active = self
            .active_guidance()
            .ok_or_recovery(RecoveryFailure::NoActiveGeometry)?;
        let position = self
            .last_position
            .ok_or_recovery(RecoveryFailure::NoKnownPosition)?;

        let route = Arc::new(self.recovery.plan(&active.planned, &position)?);
        debug!(
            "[Guidance] Replacing route {} with recovered route {}",
            active.route.uuid, route.uuid
        );
        self.state = SessionState::Guiding(ActiveGuidance {
            route: route.clone(),
            deviation: DeviationState::default(),
            start_reached: true,
            ..active.clone()
        });
        Ok(route)
    }

    /// Drop the planned geometry and route. The last known position is kept.
    pub fn clear(&mut self) {
        if !matches!(self.state, SessionState::Idle) {
            info!("[Guidance] Session cleared");
        }
        self.state = SessionState::Idle;
    }

    /// Enter free drive, dropping any planned geometry.
    pub fn start_free_drive(&mut self) {
        info!("[Guidance] Free drive started");
        self.state = SessionState::FreeDrive;
    }

    /// Fail with [`RouteError::NoActiveSession`] unless guiding.
    pub fn require_guidance(&self) -> Result<&ActiveGuidance> {
        self.active_guidance().ok_or(RouteError::NoActiveSession)
    }
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new(GuidanceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    // 11 points along the equator, ~1.1 km apart
    const PLANNED: &str = r#"{"type":"LineString","coordinates":[[0.0,0.0],[0.01,0.0],[0.02,0.0],[0.03,0.0],[0.04,0.0],[0.05,0.0],[0.06,0.0],[0.07,0.0],[0.08,0.0],[0.09,0.0],[0.1,0.0]]}"#;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_build_installs_planned_route() {
        let mut session = NavigationSession::default();
        let route = session.build_route(PLANNED, Some("#00FF00")).unwrap();

        assert_eq!(route.waypoints.len(), 11);
        assert_eq!(route.legs.len(), 10);
        let active = session.active_guidance().unwrap();
        assert!(active.start_reached);
        assert_eq!(active.color, RouteColor::rgb(0, 0xFF, 0));
        assert_eq!(active.deviation, DeviationState::default());
        assert!(Arc::ptr_eq(&active.planned, &route.geometry));
    }

    #[test]
    fn test_failed_build_keeps_previous_state() {
        let mut session = NavigationSession::default();
        let route = session.build_route(PLANNED, None).unwrap();

        let err = session
            .build_route(r#"{"type":"LineString","coordinates":[[0.0,0.0]]}"#, None)
            .unwrap_err();
        assert!(matches!(err, RouteError::InsufficientPoints { .. }));
        assert!(session.build_route("not a route !!", None).is_err());
        assert_eq!(session.active_route().unwrap().uuid, route.uuid);
    }

    #[test]
    fn test_position_is_recorded_everywhere() {
        let mut session = NavigationSession::default();
        assert_eq!(session.on_location_update(Coordinate::new(1.0, 1.0), t(0)), None);
        assert_eq!(session.last_position(), Some(Coordinate::new(1.0, 1.0)));

        session.start_free_drive();
        assert_eq!(session.on_location_update(Coordinate::new(2.0, 2.0), t(1)), None);
        assert_eq!(session.last_position(), Some(Coordinate::new(2.0, 2.0)));

        session.on_location_update(Coordinate::new(f64::NAN, 2.0), t(2));
        assert_eq!(session.last_position(), Some(Coordinate::new(2.0, 2.0)));
    }

    #[test]
    fn test_off_route_then_back() {
        let mut session = NavigationSession::default();
        session.build_route(PLANNED, None).unwrap();

        assert_eq!(session.on_location_update(Coordinate::new(0.0, 0.05), t(0)), None);

        // ~220 m north
        let event = session.on_location_update(Coordinate::new(0.002, 0.05), t(3));
        match event {
            Some(GuidanceEvent::OffRouteEntered {
                distance_meters,
                threshold_meters,
                ..
            }) => {
                assert!(distance_meters > 200.0);
                assert_eq!(threshold_meters, 80.0);
            }
            other => panic!("expected OffRouteEntered, got {:?}", other),
        }
        // Throttled: no event even though still off route
        assert_eq!(session.on_location_update(Coordinate::new(0.002, 0.05), t(4)), None);
        assert_eq!(session.on_location_update(Coordinate::new(0.002, 0.05), t(6)), None);

        let event = session.on_location_update(Coordinate::new(0.0001, 0.05), t(9));
        assert!(matches!(event, Some(GuidanceEvent::OffRouteCleared { .. })));
    }

    #[test]
    fn test_route_to_start_detour_and_switch() {
        let mut session = NavigationSession::default();
        // ~1.1 km north of the planned start
        let far = Coordinate::new(0.01, 0.0);
        session.on_location_update(far, t(0));

        let detour = session.build_route(PLANNED, None).unwrap();
        assert!(is_route_to_start_detour(&detour));
        assert_eq!(detour.waypoints.first(), Some(&far));
        assert_eq!(detour.waypoints.last(), Some(&Coordinate::new(0.0, 0.0)));
        assert_eq!(session.planned_geometry().unwrap().len(), 11);
        assert!(!session.active_guidance().unwrap().start_reached);

        // Still far: no switch
        assert!(!matches!(
            session.on_location_update(Coordinate::new(0.005, 0.0), t(3)),
            Some(GuidanceEvent::ArrivedAtStart { .. })
        ));

        // ~22 m from the start
        let event = session.on_location_update(Coordinate::new(0.0002, 0.0), t(6));
        let route = match event {
            Some(GuidanceEvent::ArrivedAtStart { route, distance_to_start }) => {
                assert!(distance_to_start < 50.0);
                route
            }
            other => panic!("expected ArrivedAtStart, got {:?}", other),
        };
        assert_eq!(route.legs.len(), 10);
        let active = session.active_guidance().unwrap();
        assert!(active.start_reached);
        assert!(!active.deviation.is_off_route);

        // One-shot
        assert_eq!(session.on_location_update(Coordinate::new(0.0, 0.0), t(9)), None);
        assert_eq!(session.active_route().unwrap().uuid, route.uuid);
    }

    #[test]
    fn test_near_start_builds_planned_route_directly() {
        let mut session = NavigationSession::default();
        session.on_location_update(Coordinate::new(0.001, 0.0), t(0));
        let route = session.build_route(PLANNED, None).unwrap();
        assert_eq!(route.legs.len(), 10);
    }

    #[test]
    fn test_two_point_plan_is_not_switched() {
        let mut session = NavigationSession::default();
        session.on_location_update(Coordinate::new(0.0, 0.0), t(0));
        let route = session
            .build_route(r#"{"type":"LineString","coordinates":[[0.0,0.0],[0.01,0.0]]}"#, None)
            .unwrap();
        assert!(is_route_to_start_detour(&route));
        assert_eq!(session.on_location_update(Coordinate::new(0.0, 0.0), t(3)), None);
        assert_eq!(session.active_route().unwrap().uuid, route.uuid);
    }

    #[test]
    fn test_upstream_off_route_recovers() {
        let mut session = NavigationSession::default();
        session.build_route(PLANNED, None).unwrap();
        session.on_location_update(Coordinate::new(0.003, 0.061), t(0));

        let route = session.on_upstream_off_route().unwrap();
        assert_eq!(route.waypoints.first(), Some(&Coordinate::new(0.0, 0.06)));
        assert_eq!(route.legs.len(), 4);
        let active = session.active_guidance().unwrap();
        assert_eq!(active.planned.len(), 11);
        assert_eq!(active.deviation, DeviationState::default());
    }

    #[test]
    fn test_recovery_failures_keep_route() {
        let mut session = NavigationSession::default();
        assert_eq!(
            session.on_upstream_off_route().unwrap_err(),
            RouteError::RecoveryImpossible {
                reason: RecoveryFailure::NoActiveGeometry
            }
        );

        let route = session.build_route(PLANNED, None).unwrap();
        assert_eq!(
            session.on_upstream_off_route().unwrap_err(),
            RouteError::RecoveryImpossible {
                reason: RecoveryFailure::NoKnownPosition
            }
        );

        // Past the end of the line
        session.on_location_update(Coordinate::new(0.0, 0.5), t(0));
        assert!(matches!(
            session.on_upstream_off_route(),
            Err(RouteError::RecoveryImpossible {
                reason: RecoveryFailure::SuffixTooShort { remaining: 1 }
            })
        ));
        assert_eq!(session.active_route().unwrap().uuid, route.uuid);
    }

    #[test]
    fn test_clear_resets_route_but_keeps_position() {
        let mut session = NavigationSession::default();
        session.build_route(PLANNED, None).unwrap();
        session.on_location_update(Coordinate::new(0.002, 0.05), t(0));
        assert!(session.active_guidance().unwrap().deviation.is_off_route);

        session.clear();
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.active_route().is_none());
        assert_eq!(session.last_position(), Some(Coordinate::new(0.002, 0.05)));
        assert!(matches!(session.require_guidance(), Err(RouteError::NoActiveSession)));
    }

    #[test]
    fn test_free_drive_has_no_deviation_checks() {
        let mut session = NavigationSession::default();
        session.build_route(PLANNED, None).unwrap();
        session.start_free_drive();
        assert!(session.is_free_drive());
        assert!(session.planned_geometry().is_none());
        assert_eq!(session.on_location_update(Coordinate::new(5.0, 5.0), t(0)), None);
    }

    #[test]
    fn test_set_config_validates() {
        let mut session = NavigationSession::default();
        let bad = GuidanceConfig {
            assumed_speed_mps: -1.0,
            ..Default::default()
        };
        assert!(session.set_config(bad).is_err());
        assert_eq!(session.config().assumed_speed_mps, 13.89);

        let options = GuidanceOptions {
            off_route_threshold_meters: Some(500.0),
            ..Default::default()
        };
        session.apply_options(&options).unwrap();
        session.build_route(PLANNED, None).unwrap();
        // 220 m is within the widened threshold
        assert_eq!(session.on_location_update(Coordinate::new(0.002, 0.05), t(0)), None);
    }
}
