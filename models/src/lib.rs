// models/src/lib.rs
// Shared types for the dispatch workspace: the request record, reference
// data and the error taxonomy every crate reports through.

pub mod coordinates;
pub mod errors;
pub mod identifiers;
pub mod medical;

pub use coordinates::Coordinates;
pub use errors::{DispatchError, DispatchResult, ValidationError, ValidationResult};
pub use identifiers::ActorId;
pub use medical::{
    ActorRole, EmergencyRequest, Hospital, HospitalDistance, HospitalStatus, NatureOfEmergency,
    NewEmergencyRequest, NewHospital, RequestStatus, TransitionPatch,
};
