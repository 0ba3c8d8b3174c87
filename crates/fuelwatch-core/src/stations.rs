use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Builds a point, rejecting values outside the valid degree ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if either value is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::validation(
                "latitude",
                format!("must be between -90 and 90, got {latitude}"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::validation(
                "longitude",
                format!("must be between -180 and 180, got {longitude}"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A station known to the registry. Price ingestion never creates these;
/// they come from explicit registration, and `location` may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub location: Option<Coordinates>,
}
