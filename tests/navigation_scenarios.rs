//! End-to-end navigation scenarios.
//!
//! Drives a session through build, deviation, recovery and the
//! route-to-start switch using only the public API.
//!
//! Run with: `cargo test --test navigation_scenarios -- --nocapture`
//! (set `RUST_LOG=debug` to see the session's log output)

use std::cell::RefCell;

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use route_fidelity::geo_utils::haversine_distance;
use route_fidelity::{
    is_route_to_start_detour, nearest_index, parse_geometry, Coordinate, Geometry, GuidanceConfig,
    GuidanceDriver, GuidanceEvent, HostEvent, NavigationHost, NavigationSession, PolylinePrecision,
    RouteColor, SyntheticRoute, MAX_WAYPOINTS,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
}

/// Straight line along the equator from (0,0) to (0,1) with `n` evenly spaced points.
fn equator_geojson(n: usize) -> String {
    let coordinates: Vec<String> = (0..n)
        .map(|i| format!("[{},0.0]", i as f64 / (n - 1) as f64))
        .collect();
    format!(r#"{{"type":"LineString","coordinates":[{}]}}"#, coordinates.join(","))
}

#[derive(Default)]
struct RecordingHost {
    installed: RefCell<Vec<String>>,
    events: RefCell<Vec<String>>,
}

impl NavigationHost for RecordingHost {
    fn install_route(&self, route: &SyntheticRoute, _color: &RouteColor) {
        self.installed.borrow_mut().push(route.uuid.clone());
    }

    fn emit_event(&self, event: &HostEvent) {
        self.events.borrow_mut().push(event.name().to_string());
    }
}

// ============================================================================
// Test: Build, Deviate, Recover
// ============================================================================

#[test]
fn test_thirty_point_line_end_to_end() {
    init_logging();
    let raw = equator_geojson(30);
    let planned = parse_geometry(&raw).unwrap();

    let mut session = NavigationSession::new(GuidanceConfig::default());
    assert_eq!(session.on_location_update(Coordinate::new(0.0, 0.0), at(0)), None);

    let route = session.build_route(&raw, None).unwrap();
    assert!(!is_route_to_start_detour(&route));
    // 30 points clamp to 25 waypoints, hence 24 legs
    assert_eq!(route.waypoints.len(), MAX_WAYPOINTS);
    assert_eq!(route.legs.len(), MAX_WAYPOINTS - 1);
    assert_eq!(route.waypoints.first(), Some(&planned.first()));
    assert_eq!(route.waypoints.last(), Some(&planned.last()));
    assert_relative_eq!(route.distance, 111_195.0, max_relative = 0.005);
    let leg_sum: f64 = route.legs.iter().map(|leg| leg.distance).sum();
    assert_relative_eq!(leg_sum, route.distance, max_relative = 1e-9);

    // ~55 km off the line
    let off = Coordinate::new(0.5, 0.5);
    let event = session.on_location_update(off, at(3));
    assert!(matches!(event, Some(GuidanceEvent::OffRouteEntered { .. })));
    assert_eq!(session.on_location_update(off, at(6)), None);

    let recovered = session.on_upstream_off_route().unwrap();
    let anchor = nearest_index(&off, planned.points()).unwrap();
    assert!(anchor == 14 || anchor == 15, "anchor = {}", anchor);
    assert_eq!(recovered.waypoints.first(), Some(&planned.points()[anchor]));
    assert_eq!(recovered.waypoints.last(), Some(&planned.last()));
    assert_eq!(recovered.geometry.len(), planned.len() - anchor);
    assert_ne!(recovered.uuid, route.uuid);

    // The planned geometry itself is never truncated
    assert_eq!(session.planned_geometry().unwrap().len(), 30);
}

#[test]
fn test_polyline_input_builds_same_shape() {
    init_logging();
    let geojson = equator_geojson(40);
    let encoded = parse_geometry(&geojson)
        .unwrap()
        .to_polyline(PolylinePrecision::Five)
        .unwrap();

    let mut session = NavigationSession::default();
    let from_polyline = session.build_route(&encoded, None).unwrap();
    let from_geojson = session.build_route(&geojson, None).unwrap();

    assert_eq!(from_polyline.legs.len(), from_geojson.legs.len());
    assert_relative_eq!(from_polyline.distance, from_geojson.distance, max_relative = 1e-4);
}

// ============================================================================
// Test: Deviation Hysteresis
// ============================================================================

#[test]
fn test_deviation_fires_once_per_crossing_with_throttle() {
    init_logging();
    let mut session = NavigationSession::default();
    session.build_route(&equator_geojson(30), None).unwrap();

    // Vertex 14 of the line
    let longitude = 14.0 / 29.0;
    // One sample per second: walk north to ~330 m, then back to the line
    let latitudes = [
        0.0, 0.0002, 0.0004, 0.0006, 0.0008, 0.001, 0.0015, 0.002, 0.003, 0.003, 0.003, 0.002,
        0.0015, 0.001, 0.0005, 0.0002, 0.0, 0.0, 0.0, 0.0,
    ];
    let mut entered = 0;
    let mut cleared = 0;
    let mut processed = 0;
    let mut last_processed: Option<i64> = None;

    for (second, latitude) in latitudes.iter().enumerate() {
        let second = second as i64;
        let before = session.active_guidance().unwrap().deviation;
        let event = session.on_location_update(Coordinate::new(*latitude, longitude), at(second));
        let after = session.active_guidance().unwrap().deviation;

        if after != before {
            processed += 1;
            if let Some(previous) = last_processed {
                assert!(second - previous >= 3, "processed {}s after {}s", second, previous);
            }
            last_processed = Some(second);
        } else {
            assert!(event.is_none());
        }

        match event {
            Some(GuidanceEvent::OffRouteEntered { .. }) => entered += 1,
            Some(GuidanceEvent::OffRouteCleared { .. }) => cleared += 1,
            _ => {}
        }
    }

    assert_eq!(entered, 1);
    assert_eq!(cleared, 1);
    // Samples at 0, 3, 6, 9, 12, 15, 18
    assert_eq!(processed, 7);
}

// ============================================================================
// Test: Route-to-Start Detour
// ============================================================================

#[test]
fn test_detour_then_switch_to_planned_route() {
    init_logging();
    let raw = equator_geojson(30);
    let mut driver = GuidanceDriver::new(NavigationSession::default(), RecordingHost::default());

    // ~2.2 km south-west of the start
    driver.on_location_update(Coordinate::new(-0.015, -0.015), at(0));
    let detour = driver.build_route(&raw, Some("#3366FF")).unwrap();
    assert!(is_route_to_start_detour(&detour));
    assert_eq!(detour.legs.len(), 1);
    assert_eq!(detour.straight_step_count(), 0);

    // Approach the start
    let approach = [(-0.01, -0.01), (-0.005, -0.005), (-0.001, -0.001), (-0.0002, 0.0)];
    let mut arrival = None;
    for (i, (lat, lng)) in approach.iter().enumerate() {
        let event = driver.on_location_update(Coordinate::new(*lat, *lng), at(3 * (i as i64 + 1)));
        if let Some(GuidanceEvent::ArrivedAtStart { route, .. }) = event {
            arrival = Some(route);
        }
    }

    let planned_route = arrival.expect("never arrived at start");
    assert_eq!(planned_route.legs.len(), MAX_WAYPOINTS - 1);
    assert_eq!(
        driver.host().installed.borrow().as_slice(),
        &[detour.uuid.clone(), planned_route.uuid.clone()]
    );
    let events = driver.host().events.borrow();
    assert!(events.contains(&"arrived_at_start".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("reroute_along"));
}

// ============================================================================
// Test: Wire Format
// ============================================================================

#[test]
fn test_long_geometry_wire_format() {
    init_logging();
    let raw = equator_geojson(2000);
    let mut session = NavigationSession::default();
    let route = session.build_route(&raw, None).unwrap();

    let value: serde_json::Value = serde_json::from_str(&route.to_json().unwrap()).unwrap();
    assert_eq!(value["code"], "Ok");
    let routes = value["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["geometry"]["coordinates"].as_array().unwrap().len(), 2000);

    let waypoints = value["waypoints"].as_array().unwrap();
    let legs = routes[0]["legs"].as_array().unwrap();
    assert_eq!(legs.len(), waypoints.len() - 1);

    for (i, leg) in legs.iter().enumerate() {
        let steps = leg["steps"].as_array().unwrap();
        // ~83 points per leg: two steps each
        assert!(steps.len() >= 2, "leg {} has {} steps", i, steps.len());
        for step in steps {
            let coordinates = step["geometry"]["coordinates"].as_array().unwrap();
            assert!(coordinates.len() <= 50);
            assert_eq!(step["maneuver"]["type"], "turn");
            assert_eq!(step["maneuver"]["location"], coordinates[0]);
        }
        let first = &steps[0]["geometry"]["coordinates"][0];
        let last_step = steps.last().unwrap()["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(first, &waypoints[i]["location"]);
        assert_eq!(last_step.last().unwrap(), &waypoints[i + 1]["location"]);
    }
}

#[test]
fn test_request_url_lists_waypoints() {
    let mut session = NavigationSession::default();
    let route = session.build_route(&equator_geojson(3), None).unwrap();
    let url = route.request_url(&session.config().directions_base_url);
    assert_eq!(
        url,
        "https://api.mapbox.com/directions/v5/mapbox/driving-traffic/0,0;0.5,0;1,0\
         ?alternatives=false&geometries=geojson&steps=true&overview=full"
    );
}

#[test]
fn test_distance_reference_values() {
    let origin = Coordinate::new(0.0, 0.0);
    assert_eq!(haversine_distance(&origin, &origin), 0.0);
    assert_relative_eq!(
        haversine_distance(&origin, &Coordinate::new(0.0, 1.0)),
        111_195.0,
        max_relative = 0.005
    );
    let g = Geometry::new(vec![origin, Coordinate::new(0.0, 1.0)]).unwrap();
    assert_relative_eq!(g.length_meters(), 111_195.0, max_relative = 0.005);
}
