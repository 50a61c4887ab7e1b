//! Off-route detection against the planned geometry.
//!
//! The monitor is a two-state machine (on route / off route) fed by live
//! positions. It is throttled: a sample arriving less than `check_interval`
//! after the last processed one is dropped without touching the state.
//! Transitions are edge-triggered, so a caller acting on
//! [`DeviationTransition`] fires exactly once per crossing of the threshold.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::{Coordinate, Geometry, GuidanceConfig};

/// Snapshot of the monitor's state. Replaced wholesale on every processed sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviationState {
    pub is_off_route: bool,
    /// Distance to the planned geometry at the last processed sample (meters)
    pub last_distance_to_route: f64,
    /// When the last sample was processed; `None` until the first one
    pub last_check: Option<DateTime<Utc>>,
}

/// Edge of the on/off-route state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationTransition {
    /// On route -> off route
    Entered,
    /// Off route -> on route
    Cleared,
}

/// Outcome of offering one position to the monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviationCheck {
    /// Inside the throttle window; nothing was computed or changed.
    Throttled,
    Sampled {
        state: DeviationState,
        transition: Option<DeviationTransition>,
    },
}

/// Throttled threshold check of positions against a geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationMonitor {
    threshold_meters: f64,
    check_interval: Duration,
}

impl DeviationMonitor {
    pub fn new(threshold_meters: f64, check_interval: Duration) -> Self {
        Self {
            threshold_meters,
            check_interval,
        }
    }

    pub fn from_config(config: &GuidanceConfig) -> Self {
        let interval_ms = i64::try_from(config.check_interval_ms).unwrap_or(i64::MAX);
        Self::new(
            config.off_route_threshold_meters,
            Duration::milliseconds(interval_ms),
        )
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    /// True when a sample at `now` falls inside the throttle window.
    pub fn is_throttled(&self, state: &DeviationState, now: DateTime<Utc>) -> bool {
        match state.last_check {
            Some(last) => now - last < self.check_interval,
            None => false,
        }
    }

    /// Offer a position. On an allowed sample the distance to the nearest
    /// geometry vertex decides the new state: strictly beyond the threshold
    /// is off route, at or under it is on route.
    pub fn check(
        &self,
        state: &DeviationState,
        geometry: &Geometry,
        position: &Coordinate,
        now: DateTime<Utc>,
    ) -> DeviationCheck {
        if self.is_throttled(state, now) {
            return DeviationCheck::Throttled;
        }

        let distance = geometry.distance_to(position);
        let is_off_route = distance > self.threshold_meters;

        let transition = match (state.is_off_route, is_off_route) {
            (false, true) => {
                warn!(
                    "[Deviation] Entered off-route state: {:.0}m from planned route (threshold {:.0}m)",
                    distance, self.threshold_meters
                );
                Some(DeviationTransition::Entered)
            }
            (true, false) => {
                info!("[Deviation] Returned to planned route: {:.0}m", distance);
                Some(DeviationTransition::Cleared)
            }
            _ => {
                debug!(
                    "[Deviation] {} planned route: {:.0}m",
                    if is_off_route { "Still off" } else { "On" },
                    distance
                );
                None
            }
        };

        DeviationCheck::Sampled {
            state: DeviationState {
                is_off_route,
                last_distance_to_route: distance,
                last_check: Some(now),
            },
            transition,
        }
    }
}

impl Default for DeviationMonitor {
    fn default() -> Self {
        Self::from_config(&GuidanceConfig::default())
    }
}
