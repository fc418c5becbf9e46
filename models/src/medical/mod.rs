// models/src/medical/mod.rs
pub mod emergency;
pub mod hospital;
pub mod role;

pub use emergency::{
    EmergencyRequest, HospitalStatus, NatureOfEmergency, NewEmergencyRequest, RequestStatus,
    TransitionPatch,
};
pub use hospital::{Hospital, HospitalDistance, NewHospital};
pub use role::ActorRole;
