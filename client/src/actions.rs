// client/src/actions.rs
// One-shot actions a role takes on a request. None retries on its own and
// none ends the session; the caller refreshes its view afterwards.

use log::{info, warn};

use lib::dispatch::Trigger;
use models::{
    ActorId, ActorRole, Coordinates, DispatchError, DispatchResult, EmergencyRequest,
    NatureOfEmergency, NewEmergencyRequest,
};

use crate::api::DispatchApi;

pub const ALREADY_TAKEN: &str = "already accepted by another unit";

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied(EmergencyRequest),
    /// The store refused the action; the request is unchanged.
    Rejected(String),
    /// The action did not reach the store or timed out.
    Failed(String),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }

    pub fn request(&self) -> Option<&EmergencyRequest> {
        match self {
            ActionOutcome::Applied(request) => Some(request),
            _ => None,
        }
    }

    fn settle(trigger: Option<&Trigger>, result: DispatchResult<EmergencyRequest>) -> Self {
        match result {
            Ok(request) => ActionOutcome::Applied(request),
            Err(DispatchError::Conflict(_))
                if matches!(trigger, Some(Trigger::Accept { .. }) | Some(Trigger::AcceptHospital { .. })) =>
            {
                ActionOutcome::Rejected(ALREADY_TAKEN.to_string())
            }
            Err(e) if e.is_rejection() => ActionOutcome::Rejected(e.to_string()),
            Err(e) => ActionOutcome::Failed(e.to_string()),
        }
    }
}

/// Fires `trigger` on request `id` as `role`.
pub async fn perform(api: &dyn DispatchApi, role: ActorRole, id: u64, trigger: Trigger) -> ActionOutcome {
    if !trigger.permitted_for(role) {
        warn!("{} may not {} request {}", role, trigger.name(), id);
        return ActionOutcome::Rejected(format!("{} may not {}", role, trigger.name()));
    }
    let description = trigger.to_string();
    let result = match &trigger {
        Trigger::AcceptHospital { hospital_id, doctor_name } => {
            api.accept_by_hospital(id, *hospital_id, doctor_name).await
        }
        _ => api.transition(id, trigger.clone().into_patch()).await,
    };
    let outcome = ActionOutcome::settle(Some(&trigger), result);
    match &outcome {
        ActionOutcome::Applied(request) => info!("{} on request {} applied (version {})", description, id, request.version),
        ActionOutcome::Rejected(reason) => info!("{} on request {} rejected: {}", description, id, reason),
        ActionOutcome::Failed(reason) => warn!("{} on request {} failed: {}", description, id, reason),
    }
    outcome
}

pub async fn accept_request(api: &dyn DispatchApi, ambulance_id: &ActorId, id: u64) -> ActionOutcome {
    let trigger = Trigger::Accept { ambulance_id: ambulance_id.clone() };
    perform(api, ActorRole::Ambulance, id, trigger).await
}

pub async fn accept_by_hospital(
    api: &dyn DispatchApi,
    hospital_id: u64,
    doctor_name: &str,
    id: u64,
) -> ActionOutcome {
    let trigger = Trigger::AcceptHospital {
        hospital_id,
        doctor_name: doctor_name.to_string(),
    };
    perform(api, ActorRole::Hospital, id, trigger).await
}

pub async fn complete_request(api: &dyn DispatchApi, role: ActorRole, id: u64) -> ActionOutcome {
    perform(api, role, id, Trigger::Complete).await
}

pub async fn report_emergency(
    api: &dyn DispatchApi,
    user_id: &ActorId,
    location: Coordinates,
    nature_of_emergency: NatureOfEmergency,
) -> ActionOutcome {
    let request = NewEmergencyRequest {
        user_id: user_id.clone(),
        coordinates: location,
        nature_of_emergency,
    };
    let outcome = ActionOutcome::settle(None, api.create_request(request).await);
    if let ActionOutcome::Applied(created) = &outcome {
        info!("Reported {} emergency as request {}", created.nature_of_emergency, created.id);
    }
    outcome
}
