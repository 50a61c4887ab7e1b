//! Unified error handling for the route-fidelity library.
//!
//! Failures only originate at two boundaries: parsing/validating caller
//! geometry, and truncating the planned geometry during recovery. Everything
//! in between (distances, sampling, nearest-point search) is total over a
//! well-formed [`Geometry`](crate::Geometry).

use std::fmt;

/// Why a recovery attempt could not produce a new route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RecoveryFailure {
    /// No planned geometry is installed (idle or free-drive session).
    NoActiveGeometry,
    /// No location update has been received yet.
    NoKnownPosition,
    /// The suffix after the nearest point is too short to navigate.
    SuffixTooShort { remaining: u32 },
}

impl fmt::Display for RecoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryFailure::NoActiveGeometry => write!(f, "no planned geometry installed"),
            RecoveryFailure::NoKnownPosition => write!(f, "no known position"),
            RecoveryFailure::SuffixTooShort { remaining } => {
                write!(f, "only {} point(s) remain after the nearest point", remaining)
            }
        }
    }
}

/// Unified error type for route-fidelity operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum RouteError {
    /// Input is neither a GeoJSON LineString nor an encoded polyline
    #[error("Geometry format error: {message}")]
    GeometryFormat { message: String },

    /// Geometry decoded but has too few points to navigate
    #[error("Geometry has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },

    /// A coordinate is not a finite number
    #[error("Invalid coordinate at index {index}: {message}")]
    InvalidCoordinates { index: usize, message: String },

    /// Deviation recovery could not re-anchor onto the planned geometry
    #[error("Recovery impossible: {reason}")]
    RecoveryImpossible { reason: RecoveryFailure },

    /// Operation requires a navigation session that is not running
    #[error("No active navigation session")]
    NoActiveSession,

    /// Payload could not be serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for route-fidelity operations.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Extension trait for converting Option to RouteError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a recovery failure.
    fn ok_or_recovery(self, reason: RecoveryFailure) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_recovery(self, reason: RecoveryFailure) -> Result<T> {
        self.ok_or(RouteError::RecoveryImpossible { reason })
    }
}
