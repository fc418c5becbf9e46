// models/src/coordinates.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};

/// A WGS84 position, always latitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> ValidationResult<Self> {
        let coordinates = Coordinates { latitude, longitude };
        coordinates.validate()?;
        Ok(coordinates)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// Parses `"lat,lng"`, the form used on command lines.
impl FromStr for Coordinates {
    type Err = ValidationError;

    fn from_str(s: &str) -> ValidationResult<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or(ValidationError::MissingField("longitude"))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidLatitude(f64::NAN))?;
        let longitude = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidLongitude(f64::NAN))?;
        Coordinates::new(latitude, longitude)
    }
}
