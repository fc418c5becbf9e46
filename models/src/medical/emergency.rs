// models/src/medical/emergency.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinates::Coordinates;
use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::ActorId;

/// Request lifecycle. The derived ordering is the only direction a request
/// may move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Completed,
}

impl RequestStatus {
    /// The single status this one may advance to.
    pub fn next(self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Pending => Some(RequestStatus::Accepted),
            RequestStatus::Accepted => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RequestStatus::Completed
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(RequestStatus::Pending),
            "ACCEPTED" => Ok(RequestStatus::Accepted),
            "COMPLETED" => Ok(RequestStatus::Completed),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HospitalStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NatureOfEmergency {
    Accident,
    Cardiac,
    Fire,
    Pregnancy,
    Other,
}

impl fmt::Display for NatureOfEmergency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NatureOfEmergency::Accident => "Accident",
            NatureOfEmergency::Cardiac => "Cardiac",
            NatureOfEmergency::Fire => "Fire",
            NatureOfEmergency::Pregnancy => "Pregnancy",
            NatureOfEmergency::Other => "Other",
        };
        f.write_str(name)
    }
}

impl FromStr for NatureOfEmergency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accident" => Ok(NatureOfEmergency::Accident),
            "cardiac" => Ok(NatureOfEmergency::Cardiac),
            "fire" => Ok(NatureOfEmergency::Fire),
            "pregnancy" => Ok(NatureOfEmergency::Pregnancy),
            "other" => Ok(NatureOfEmergency::Other),
            other => Err(ValidationError::UnknownNatureOfEmergency(other.to_string())),
        }
    }
}

/// The shared request record. Only a request store constructs or mutates one;
/// clients hold copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: u64,
    pub user_id: ActorId,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub nature_of_emergency: NatureOfEmergency,
    pub status: RequestStatus,
    pub assigned_ambulance_id: Option<ActorId>,
    pub hospital_id: Option<u64>,
    pub doctor_name: Option<String>,
    pub hospital_status: Option<HospitalStatus>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every committed transition.
    pub version: u64,
}

impl EmergencyRequest {
    /// Builds the initial PENDING record for a freshly assigned id.
    pub fn from_new(id: u64, new: NewEmergencyRequest, created_at: DateTime<Utc>) -> Self {
        EmergencyRequest {
            id,
            user_id: new.user_id,
            coordinates: new.coordinates,
            nature_of_emergency: new.nature_of_emergency,
            status: RequestStatus::Pending,
            assigned_ambulance_id: None,
            hospital_id: None,
            doctor_name: None,
            hospital_status: None,
            created_at,
            version: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Body of `POST /api/emergencies`. Any status or assignment fields a client
/// sends alongside are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmergencyRequest {
    pub user_id: ActorId,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub nature_of_emergency: NatureOfEmergency,
}

impl NewEmergencyRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        self.coordinates.validate()
    }
}

/// The fields a transition sets. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_ambulance_id: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_status: Option<HospitalStatus>,
    /// Optimistic concurrency precondition on `EmergencyRequest::version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl TransitionPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_ambulance_id.is_none()
            && self.hospital_id.is_none()
            && self.doctor_name.is_none()
            && self.hospital_status.is_none()
    }

    pub fn touches_hospital(&self) -> bool {
        self.hospital_id.is_some() || self.doctor_name.is_some() || self.hospital_status.is_some()
    }
}
