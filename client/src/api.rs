// client/src/api.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use lib::dispatch::Trigger;
use lib::hospitals::HospitalDirectory;
use lib::storage_engine::RequestStore;
use models::{
    Coordinates, DispatchError, DispatchResult, EmergencyRequest, Hospital, HospitalDistance,
    NewEmergencyRequest, TransitionPatch, ValidationError,
};

/// What a client needs from the request store.
#[async_trait]
pub trait DispatchApi: Send + Sync + 'static {
    async fn list_requests(&self) -> DispatchResult<Vec<EmergencyRequest>>;

    async fn create_request(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest>;

    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest>;

    async fn accept_by_hospital(
        &self,
        id: u64,
        hospital_id: u64,
        doctor_name: &str,
    ) -> DispatchResult<EmergencyRequest>;

    async fn list_hospitals(&self) -> DispatchResult<Vec<Hospital>>;

    async fn nearest_hospitals(&self, origin: Coordinates) -> DispatchResult<Vec<HospitalDistance>>;
}

fn transport_error(err: reqwest::Error) -> DispatchError {
    if err.is_timeout() {
        DispatchError::Timeout(err.to_string())
    } else if err.is_decode() {
        DispatchError::SerializationError(err.to_string())
    } else {
        DispatchError::NetworkError(err.to_string())
    }
}

/// Maps an error response from the server back onto the error it reported.
fn status_error(status: StatusCode, body: &str) -> DispatchError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    match status {
        StatusCode::CONFLICT => DispatchError::Conflict(message),
        StatusCode::UNPROCESSABLE_ENTITY => DispatchError::InvalidTransition(message),
        StatusCode::NOT_FOUND => {
            let subject = message.strip_suffix(" was not found").unwrap_or(&message);
            DispatchError::NotFound(subject.to_string())
        }
        StatusCode::BAD_REQUEST => DispatchError::Validation(ValidationError::Rejected(message)),
        _ => DispatchError::NetworkError(format!("server returned {}: {}", status, message)),
    }
}

/// Talks to the REST API over HTTP. Every call is bounded by the client
/// timeout.
#[derive(Debug, Clone)]
pub struct HttpDispatchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDispatchClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(HttpDispatchClient { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> DispatchResult<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(transport_error);
        }
        let body = response.text().await.map_err(transport_error)?;
        debug!("Server answered {} with {}", status, body);
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl DispatchApi for HttpDispatchClient {
    async fn list_requests(&self) -> DispatchResult<Vec<EmergencyRequest>> {
        let response = self
            .client
            .get(self.url("/emergencies"))
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn create_request(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
        let response = self
            .client
            .post(self.url("/emergencies"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest> {
        let response = self
            .client
            .patch(self.url(&format!("/emergencies/{}", id)))
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn accept_by_hospital(
        &self,
        id: u64,
        hospital_id: u64,
        doctor_name: &str,
    ) -> DispatchResult<EmergencyRequest> {
        let hospital_id = hospital_id.to_string();
        let response = self
            .client
            .put(self.url(&format!("/hospitals/accept/{}", id)))
            .query(&[("hospitalId", hospital_id.as_str()), ("doctorName", doctor_name)])
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn list_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
        let response = self
            .client
            .get(self.url("/hospitals"))
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    async fn nearest_hospitals(&self, origin: Coordinates) -> DispatchResult<Vec<HospitalDistance>> {
        let response = self
            .client
            .get(self.url("/hospitals/nearest"))
            .query(&[("latitude", origin.latitude), ("longitude", origin.longitude)])
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }
}

/// In-process API over a store and directory, for embedding and tests.
#[derive(Clone)]
pub struct LocalDispatchApi {
    store: Arc<dyn RequestStore>,
    hospitals: HospitalDirectory,
}

impl LocalDispatchApi {
    pub fn new(store: Arc<dyn RequestStore>, hospitals: HospitalDirectory) -> Self {
        LocalDispatchApi { store, hospitals }
    }
}

#[async_trait]
impl DispatchApi for LocalDispatchApi {
    async fn list_requests(&self) -> DispatchResult<Vec<EmergencyRequest>> {
        self.store.list().await
    }

    async fn create_request(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
        self.store.create(request).await
    }

    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest> {
        self.store.transition(id, patch).await
    }

    async fn accept_by_hospital(
        &self,
        id: u64,
        hospital_id: u64,
        doctor_name: &str,
    ) -> DispatchResult<EmergencyRequest> {
        if !self.hospitals.contains(hospital_id).await {
            return Err(DispatchError::hospital_not_found(hospital_id));
        }
        let patch = Trigger::AcceptHospital {
            hospital_id,
            doctor_name: doctor_name.to_string(),
        }
        .into_patch();
        self.store.transition(id, patch).await
    }

    async fn list_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
        Ok(self.hospitals.list().await)
    }

    async fn nearest_hospitals(&self, origin: Coordinates) -> DispatchResult<Vec<HospitalDistance>> {
        origin.validate()?;
        Ok(self.hospitals.nearest(origin).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_server_errors() {
        let body = r#"{"status":"error","message":"Conflict: request 1 already accepted by A"}"#;
        assert!(matches!(status_error(StatusCode::CONFLICT, body), DispatchError::Conflict(_)));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, body),
            DispatchError::InvalidTransition(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "upstream down").is_transient());
        assert_eq!(
            status_error(
                StatusCode::NOT_FOUND,
                r#"{"status":"error","message":"hospital 4 was not found"}"#
            ),
            DispatchError::hospital_not_found(4)
        );
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, "missing field"),
            DispatchError::Validation(ValidationError::Rejected("missing field".to_string()))
        );
    }

    #[test]
    fn should_normalize_base_url() {
        let client = HttpDispatchClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/emergencies"), "http://localhost:8080/api/emergencies");
    }

    #[tokio::test]
    async fn should_report_unreachable_server_as_transient() {
        // Port 9 (discard) is closed on test hosts.
        let client = HttpDispatchClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.list_requests().await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
