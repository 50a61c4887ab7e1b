//! Geometry codec: GeoJSON LineString and encoded polyline.
//!
//! Inbound route geometry is tried against an ordered list of parser
//! strategies; the first one that decodes wins. Encoded polylines appear at
//! two precisions that must not be mixed: precision 5 for caller-supplied
//! routes and precision 6 for the planned-route rendering layer.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Coordinate, Geometry, Result, RouteError};

/// Fixed-point precision of an encoded polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolylinePrecision {
    /// 1e5 scale: inbound route geometry
    Five,
    /// 1e6 scale: rendering-layer geometry
    Six,
}

impl PolylinePrecision {
    pub fn digits(&self) -> u32 {
        match self {
            PolylinePrecision::Five => 5,
            PolylinePrecision::Six => 6,
        }
    }
}

/// GeoJSON LineString on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStringJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<[f64; 2]>,
}

impl LineStringJson {
    pub fn from_points(points: &[Coordinate]) -> Self {
        Self {
            kind: "LineString".to_string(),
            coordinates: points.iter().map(Coordinate::lon_lat).collect(),
        }
    }
}

/// Lenient inbound shape: positions may carry extra values (altitude).
#[derive(Debug, Deserialize)]
struct LineStringInput {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    coordinates: Vec<Vec<f64>>,
}

type ParseStrategy = fn(&str) -> Result<Vec<Coordinate>>;

/// Inbound route parsers, in the order they are tried.
const ROUTE_STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("geojson", decode_geojson),
    ("polyline5", decode_polyline5),
];

/// Rendering-layer parsers.
const RENDER_STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("geojson", decode_geojson),
    ("polyline6", decode_polyline6),
];

/// Parse caller-supplied route geometry: GeoJSON LineString first, then a
/// precision-5 encoded polyline.
///
/// # Example
/// ```
/// use route_fidelity::parse_geometry;
/// let g = parse_geometry(r#"{"type":"LineString","coordinates":[[-120.2,38.5],[-120.95,40.7]]}"#).unwrap();
/// assert_eq!(g.len(), 2);
/// let g = parse_geometry("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
/// assert_eq!(g.len(), 3);
/// ```
pub fn parse_geometry(raw: &str) -> Result<Geometry> {
    parse_with(raw, ROUTE_STRATEGIES)
}

/// Parse geometry stored for the planned-route layer: GeoJSON, or a
/// precision-6 encoded polyline.
pub fn parse_render_geometry(raw: &str) -> Result<Geometry> {
    parse_with(raw, RENDER_STRATEGIES)
}

/// Decode an encoded polyline at the given precision. No point-count check.
///
/// Decoded values are not range-checked: a string that decodes to latitudes
/// beyond ±90° or longitudes beyond ±180° yields those values as-is.
pub fn decode_polyline(raw: &str, precision: PolylinePrecision) -> Result<Vec<Coordinate>> {
    let factor = 10_f64.powi(precision.digits() as i32);
    let bytes = raw.as_bytes();
    let mut points = Vec::new();
    let mut latitude: i64 = 0;
    let mut longitude: i64 = 0;
    let mut index = 0;

    while index < bytes.len() {
        let (lat_delta, next) = decode_value(bytes, index, precision)?;
        let (lng_delta, next) = decode_value(bytes, next, precision)?;
        index = next;

        latitude = latitude
            .checked_add(lat_delta)
            .ok_or_else(|| polyline_error(precision, format!("latitude overflow at byte {}", index)))?;
        longitude = longitude
            .checked_add(lng_delta)
            .ok_or_else(|| polyline_error(precision, format!("longitude overflow at byte {}", index)))?;
        points.push(Coordinate::new(latitude as f64 / factor, longitude as f64 / factor));
    }

    Ok(points)
}

/// One zigzag-encoded delta: 5-bit chunks, least significant first, each
/// offset by 63 and flagged with 0x20 while more chunks follow.
fn decode_value(bytes: &[u8], mut index: usize, precision: PolylinePrecision) -> Result<(i64, usize)> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(index) else {
            return Err(polyline_error(precision, format!("truncated value at byte {}", index)));
        };
        if !(63..=126).contains(&byte) {
            return Err(polyline_error(
                precision,
                format!("invalid character {:?} at byte {}", byte as char, index),
            ));
        }
        if shift > 55 {
            return Err(polyline_error(precision, format!("value too long at byte {}", index)));
        }

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        index += 1;
        if chunk < 0x20 {
            break;
        }
    }

    let value = if result & 1 == 1 { !(result >> 1) } else { result >> 1 };
    Ok((value, index))
}

fn polyline_error(precision: PolylinePrecision, message: String) -> RouteError {
    RouteError::GeometryFormat {
        message: format!("polyline{}: {}", precision.digits(), message),
    }
}

/// Serialize a geometry as a GeoJSON LineString, coordinates in source order.
pub fn to_geojson(geometry: &Geometry) -> String {
    let line = LineStringJson::from_points(geometry.points());
    // A struct of strings and finite floats always serializes
    serde_json::to_string(&line).unwrap_or_default()
}

impl Geometry {
    /// GeoJSON LineString representation.
    pub fn to_geojson(&self) -> String {
        to_geojson(self)
    }

    /// Encoded polyline at the given precision.
    pub fn to_polyline(&self, precision: PolylinePrecision) -> Result<String> {
        let line: geo::LineString<f64> = self.points().iter().map(|p| geo::Coord::from(*p)).collect();
        polyline::encode_coordinates(line, precision.digits())
            .map_err(|e| polyline_error(precision, e.to_string()))
    }
}

fn parse_with(raw: &str, strategies: &[(&str, ParseStrategy)]) -> Result<Geometry> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RouteError::InsufficientPoints {
            point_count: 0,
            minimum_required: Geometry::MIN_POINTS,
        });
    }
    let mut failures = Vec::with_capacity(strategies.len());

    for (name, strategy) in strategies {
        match strategy(raw) {
            Ok(points) => {
                debug!("[Codec] Decoded {} points as {}", points.len(), name);
                return Geometry::new(points);
            }
            Err(err) => failures.push(format!("{}: {}", name, err)),
        }
    }

    Err(RouteError::GeometryFormat {
        message: failures.join("; "),
    })
}

fn decode_polyline5(raw: &str) -> Result<Vec<Coordinate>> {
    decode_polyline(raw, PolylinePrecision::Five)
}

fn decode_polyline6(raw: &str) -> Result<Vec<Coordinate>> {
    decode_polyline(raw, PolylinePrecision::Six)
}

fn decode_geojson(raw: &str) -> Result<Vec<Coordinate>> {
    let input: LineStringInput =
        serde_json::from_str(raw).map_err(|e| RouteError::GeometryFormat {
            message: e.to_string(),
        })?;

    if let Some(kind) = input.kind.as_deref() {
        if kind != "LineString" {
            return Err(RouteError::GeometryFormat {
                message: format!("expected LineString, got {}", kind),
            });
        }
    }

    input
        .coordinates
        .iter()
        .enumerate()
        .map(|(index, position)| match position.as_slice() {
            [lng, lat, ..] => Ok(Coordinate::new(*lat, *lng)),
            _ => Err(RouteError::GeometryFormat {
                message: format!("position {} has {} values, expected [lon, lat]", index, position.len()),
            }),
        })
        .collect()
}
