// lib/src/dispatch.rs
// Request lifecycle rules. Every store engine commits through `apply_patch`,
// so the guards below hold no matter which engine is configured.
//
//   PENDING --accept (ambulance)--> ACCEPTED --complete--> COMPLETED
//   hospital acceptance is a separate axis, allowed while not COMPLETED.

use std::fmt;

use models::{
    ActorId, ActorRole, DispatchError, DispatchResult, EmergencyRequest, HospitalStatus,
    RequestStatus, TransitionPatch, ValidationError,
};

/// What an actor asks the state machine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Accept { ambulance_id: ActorId },
    AcceptHospital { hospital_id: u64, doctor_name: String },
    Complete,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Accept { .. } => "accept",
            Trigger::AcceptHospital { .. } => "accept-hospital",
            Trigger::Complete => "complete",
        }
    }

    /// Role tagging only; there is no per-user permission model.
    pub fn permitted_for(&self, role: ActorRole) -> bool {
        match self {
            Trigger::Accept { .. } => role == ActorRole::Ambulance,
            Trigger::AcceptHospital { .. } => role == ActorRole::Hospital,
            Trigger::Complete => true,
        }
    }

    /// Whether the guard for this trigger currently holds on `request`.
    pub fn is_enabled(&self, request: &EmergencyRequest) -> bool {
        match self {
            Trigger::Accept { .. } => {
                request.status == RequestStatus::Pending && request.assigned_ambulance_id.is_none()
            }
            Trigger::AcceptHospital { .. } => request.is_open() && request.hospital_id.is_none(),
            Trigger::Complete => request.status == RequestStatus::Accepted,
        }
    }

    pub fn into_patch(self) -> TransitionPatch {
        match self {
            Trigger::Accept { ambulance_id } => TransitionPatch {
                status: Some(RequestStatus::Accepted),
                assigned_ambulance_id: Some(ambulance_id),
                ..TransitionPatch::default()
            },
            Trigger::AcceptHospital { hospital_id, doctor_name } => TransitionPatch {
                hospital_id: Some(hospital_id),
                doctor_name: Some(doctor_name),
                hospital_status: Some(HospitalStatus::Accepted),
                ..TransitionPatch::default()
            },
            Trigger::Complete => TransitionPatch {
                status: Some(RequestStatus::Completed),
                ..TransitionPatch::default()
            },
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks the role tag and applies `trigger` to `current`.
pub fn fire(current: &EmergencyRequest, role: ActorRole, trigger: Trigger) -> DispatchResult<EmergencyRequest> {
    if !trigger.permitted_for(role) {
        return Err(DispatchError::InvalidTransition(format!(
            "{} actors cannot {}",
            role, trigger
        )));
    }
    apply_patch(current, &trigger.into_patch())
}

/// Validates `patch` against `current` and returns the record to commit.
/// `current` is never modified; on success the version is bumped by one.
pub fn apply_patch(current: &EmergencyRequest, patch: &TransitionPatch) -> DispatchResult<EmergencyRequest> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch.into());
    }
    if let Some(expected) = patch.expected_version {
        if expected != current.version {
            return Err(DispatchError::Conflict(format!(
                "request {} is at version {}, expected {}",
                current.id, current.version, expected
            )));
        }
    }

    let mut next = current.clone();
    apply_ambulance_axis(current, patch, &mut next)?;
    if patch.touches_hospital() {
        apply_hospital_axis(current, patch, &mut next)?;
    }
    next.version = current.version + 1;
    Ok(next)
}

fn apply_ambulance_axis(
    current: &EmergencyRequest,
    patch: &TransitionPatch,
    next: &mut EmergencyRequest,
) -> DispatchResult<()> {
    if let Some(existing) = &current.assigned_ambulance_id {
        if patch.assigned_ambulance_id.is_some() {
            return Err(DispatchError::Conflict(format!(
                "request {} already accepted by {}",
                current.id, existing
            )));
        }
    }

    match (patch.status, &patch.assigned_ambulance_id) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(ValidationError::MissingField("status").into()),
        (Some(RequestStatus::Accepted), None) => {
            Err(ValidationError::MissingField("assignedAmbulanceId").into())
        }
        (Some(RequestStatus::Accepted), Some(ambulance_id)) => {
            ensure_forward(current, RequestStatus::Accepted)?;
            next.status = RequestStatus::Accepted;
            next.assigned_ambulance_id = Some(ambulance_id.clone());
            Ok(())
        }
        (Some(RequestStatus::Completed), Some(_)) => Err(DispatchError::InvalidTransition(
            "an ambulance can only be assigned on acceptance".to_string(),
        )),
        (Some(status), None) => {
            ensure_forward(current, status)?;
            next.status = status;
            Ok(())
        }
        (Some(RequestStatus::Pending), Some(_)) => Err(DispatchError::Conflict(format!(
            "request {} cannot return to PENDING",
            current.id
        ))),
    }
}

/// Allows exactly one step forward. Staying put or moving back is a conflict
/// with whoever moved the request first; jumping ahead is never valid.
fn ensure_forward(current: &EmergencyRequest, target: RequestStatus) -> DispatchResult<()> {
    if target <= current.status {
        return Err(DispatchError::Conflict(format!(
            "request {} is already {}",
            current.id, current.status
        )));
    }
    if current.status.next() != Some(target) {
        return Err(DispatchError::InvalidTransition(format!(
            "request {} cannot move from {} to {}",
            current.id, current.status, target
        )));
    }
    Ok(())
}

fn apply_hospital_axis(
    current: &EmergencyRequest,
    patch: &TransitionPatch,
    next: &mut EmergencyRequest,
) -> DispatchResult<()> {
    if let Some(existing) = current.hospital_id {
        return Err(DispatchError::Conflict(format!(
            "request {} already accepted by hospital {}",
            current.id, existing
        )));
    }
    if current.status.is_terminal() {
        return Err(DispatchError::InvalidTransition(format!(
            "request {} is already {}",
            current.id, current.status
        )));
    }
    let hospital_id = patch
        .hospital_id
        .ok_or(ValidationError::MissingField("hospitalId"))?;
    let doctor_name = patch
        .doctor_name
        .as_deref()
        .ok_or(ValidationError::MissingField("doctorName"))?
        .trim();
    if doctor_name.is_empty() {
        return Err(ValidationError::EmptyField("doctorName").into());
    }
    if patch.hospital_status == Some(HospitalStatus::Pending) {
        return Err(DispatchError::InvalidTransition(
            "hospital status can only be set to ACCEPTED".to_string(),
        ));
    }

    next.hospital_id = Some(hospital_id);
    next.doctor_name = Some(doctor_name.to_string());
    next.hospital_status = Some(HospitalStatus::Accepted);
    Ok(())
}
