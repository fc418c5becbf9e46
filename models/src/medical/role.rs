// models/src/medical/role.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Which kind of client is acting. Determines the triggers a client may fire
/// and the subset of requests it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    User,
    Ambulance,
    Hospital,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorRole::User => "USER",
            ActorRole::Ambulance => "AMBULANCE",
            ActorRole::Hospital => "HOSPITAL",
        };
        f.write_str(name)
    }
}

impl FromStr for ActorRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "submitter" => Ok(ActorRole::User),
            "ambulance" => Ok(ActorRole::Ambulance),
            "hospital" => Ok(ActorRole::Hospital),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}
