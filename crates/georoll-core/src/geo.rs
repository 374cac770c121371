//! Great-circle distance and geofence primitives.
//!
//! Distances are computed with the haversine formula on a spherical Earth of
//! radius [`EARTH_RADIUS_METERS`]. [`distance`] does not validate its inputs;
//! callers that accept coordinates from the outside world should run
//! [`Coordinate::validate`] first.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 40.7128, "longitude": -74.006 }))]
pub struct Coordinate {
    /// Latitude in degrees, `-90..=90`.
    #[schema(example = 40.7128, minimum = -90, maximum = 90)]
    pub latitude: f64,

    /// Longitude in degrees, `-180..=180`.
    #[schema(example = json!(-74.006), minimum = -180, maximum = 180)]
    pub longitude: f64,
}

/// Reasons a coordinate, accuracy or radius is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    /// Latitude is not a finite value in `-90..=90`.
    #[error("Latitude {latitude} is outside the valid range of -90 to 90 degrees")]
    LatitudeOutOfRange {
        /// The rejected latitude.
        latitude: f64,
    },

    /// Longitude is not a finite value in `-180..=180`.
    #[error("Longitude {longitude} is outside the valid range of -180 to 180 degrees")]
    LongitudeOutOfRange {
        /// The rejected longitude.
        longitude: f64,
    },

    /// Reported GPS accuracy is negative or not finite.
    #[error("GPS accuracy {accuracy_meters}m must be a non-negative number of meters")]
    InvalidAccuracy {
        /// The rejected accuracy.
        accuracy_meters: f64,
    },

    /// Geofence radius is not a positive, finite number of meters.
    #[error("Geofence radius {radius_meters}m must be greater than zero")]
    InvalidRadius {
        /// The rejected radius.
        radius_meters: f64,
    },
}

impl Coordinate {
    /// Create a coordinate without validating it.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range component, latitude first.
    pub fn validate(&self) -> Result<(), GeoError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoError::LatitudeOutOfRange {
                latitude: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoError::LongitudeOutOfRange {
                longitude: self.longitude,
            });
        }
        Ok(())
    }
}

/// Great-circle distance between two coordinates in meters.
///
/// Uses the haversine formula. The result is non-negative and symmetric in
/// its arguments.
#[must_use]
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    // Fixed operand order keeps the result bit-identical when swapped.
    let (a, b) = if (a.latitude, a.longitude) <= (b.latitude, b.longitude) {
        (a, b)
    } else {
        (b, a)
    };

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// A circular check-in boundary declared by an instructor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "center": { "latitude": 40.7128, "longitude": -74.006 },
    "radius_meters": 50.0
}))]
pub struct GeoFence {
    /// Instructor-declared class location.
    pub center: Coordinate,

    /// Maximum distance from `center` that still counts as present.
    #[schema(example = 50.0, minimum = 0)]
    pub radius_meters: f64,
}

impl GeoFence {
    /// Create a validated geofence.
    ///
    /// # Errors
    ///
    /// Returns an error if the center is out of range or the radius is not a
    /// positive, finite number.
    pub fn new(center: Coordinate, radius_meters: f64) -> Result<Self, GeoError> {
        let fence = Self {
            center,
            radius_meters,
        };
        fence.validate()?;
        Ok(fence)
    }

    /// Check the center and radius.
    ///
    /// # Errors
    ///
    /// See [`GeoFence::new`].
    pub fn validate(&self) -> Result<(), GeoError> {
        self.center.validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(GeoError::InvalidRadius {
                radius_meters: self.radius_meters,
            });
        }
        Ok(())
    }

    /// Distance from the fence center to `point` in meters.
    #[must_use]
    pub fn distance_from_center(&self, point: &Coordinate) -> f64 {
        distance(&self.center, point)
    }

    /// Whether `distance_meters` falls inside the fence. The boundary is inclusive.
    #[must_use]
    pub fn admits(&self, distance_meters: f64) -> bool {
        distance_meters <= self.radius_meters
    }
}
