// models/src/medical/hospital.rs
use serde::{Deserialize, Serialize};

use crate::coordinates::Coordinates;
use crate::errors::{ValidationError, ValidationResult};

/// Reference data served by the hospital directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: u64,
    pub name: String,
    pub address: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

/// Body of a hospital registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHospital {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl NewHospital {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        self.coordinates.validate()
    }
}

/// A hospital annotated with its distance from some origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalDistance {
    #[serde(flatten)]
    pub hospital: Hospital,
    pub distance_km: f64,
}
