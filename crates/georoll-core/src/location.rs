//! Client-reported location fixes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::{Coordinate, GeoError};

/// A single GPS fix produced for one check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationSample {
    /// Measured position.
    pub coordinate: Coordinate,

    /// Reported horizontal accuracy radius in meters.
    #[schema(example = 12.0, minimum = 0)]
    pub accuracy_meters: f64,

    /// When the fix was taken.
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    /// Create a sample without validating it.
    #[must_use]
    pub const fn new(coordinate: Coordinate, accuracy_meters: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy_meters,
            captured_at,
        }
    }

    /// Check the coordinate range and that accuracy is a non-negative number.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, coordinate before accuracy.
    pub fn validate(&self) -> Result<(), GeoError> {
        self.coordinate.validate()?;
        if !self.accuracy_meters.is_finite() || self.accuracy_meters < 0.0 {
            return Err(GeoError::InvalidAccuracy {
                accuracy_meters: self.accuracy_meters,
            });
        }
        Ok(())
    }
}

/// Why the location provider could not produce a fix.
///
/// These mirror the failure codes of the browser geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationFailure {
    /// The user denied location access.
    PermissionDenied,
    /// The device could not determine its position.
    PositionUnavailable,
    /// No fix arrived before the provider's deadline.
    Timeout,
    /// The client has no geolocation support.
    Unsupported,
}

impl LocationFailure {
    /// User-facing explanation.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location access denied. Please enable location permissions.",
            Self::PositionUnavailable => "Location information is unavailable.",
            Self::Timeout => "Location request timed out.",
            Self::Unsupported => "Geolocation is not supported by this device.",
        }
    }
}
