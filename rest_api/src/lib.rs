// rest_api/src/lib.rs
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put, MethodRouter},
    Json, Router,
};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use anyhow::{Context, Error as AnyhowError};

use lib::config::DispatchConfig;
use lib::dispatch::Trigger;
use lib::hospitals::HospitalDirectory;
use lib::storage_engine::{create_request_store, RequestStore};
use models::{
    Coordinates, DispatchError, EmergencyRequest, Hospital, HospitalDistance, NewEmergencyRequest,
    NewHospital, TransitionPatch,
};

pub mod config;

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<JsonRejection> for RestApiError {
    fn from(rejection: JsonRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for RestApiError {
    fn from(rejection: QueryRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for RestApiError {
    fn from(rejection: PathRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl RestApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RestApiError::Dispatch(e) => match e {
                DispatchError::Conflict(_) => StatusCode::CONFLICT,
                DispatchError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
                DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }

        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, RestApiError>;

/// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RequestStore>,
    pub hospitals: HospitalDirectory,
}

impl AppState {
    pub fn new(store: Arc<dyn RequestStore>, hospitals: HospitalDirectory) -> Self {
        AppState { store, hospitals }
    }

    /// Opens the configured store and seeds the hospital directory.
    pub async fn from_config(config: &DispatchConfig) -> Result<Self, AnyhowError> {
        let store = create_request_store(&config.storage)?;
        let hospitals = HospitalDirectory::with_seed(config.hospitals.clone())
            .await
            .context("Failed to seed hospital directory")?;
        Ok(AppState::new(store, hospitals))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalAcceptParams {
    pub hospital_id: u64,
    pub doctor_name: String,
}

#[derive(Debug, Deserialize)]
pub struct NearestParams {
    pub latitude: f64,
    pub longitude: f64,
}

async fn health_check_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "storage": state.store.get_type(),
    }))
}

async fn list_requests_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<EmergencyRequest>>> {
    Ok(Json(state.store.list().await?))
}

async fn create_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewEmergencyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmergencyRequest>)> {
    let Json(request) = payload?;
    let created = state.store.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_request_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<EmergencyRequest>> {
    let Path(id) = id?;
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| DispatchError::request_not_found(id).into())
}

async fn transition_request_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<TransitionPatch>, JsonRejection>,
) -> ApiResult<Json<EmergencyRequest>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    // `hospitalId` is write-once, so it must name a registered hospital.
    if let Some(hospital_id) = patch.hospital_id {
        if !state.hospitals.contains(hospital_id).await {
            return Err(DispatchError::hospital_not_found(hospital_id).into());
        }
    }
    let updated = state.store.transition(id, patch).await?;
    info!("Request {} is now {} (version {})", id, updated.status, updated.version);
    Ok(Json(updated))
}

async fn hospital_accept_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    params: Result<Query<HospitalAcceptParams>, QueryRejection>,
) -> ApiResult<Json<EmergencyRequest>> {
    let Path(id) = id?;
    let Query(params) = params?;
    if !state.hospitals.contains(params.hospital_id).await {
        return Err(DispatchError::hospital_not_found(params.hospital_id).into());
    }
    let patch = Trigger::AcceptHospital {
        hospital_id: params.hospital_id,
        doctor_name: params.doctor_name,
    }
    .into_patch();
    let updated = state.store.transition(id, patch).await?;
    info!("Hospital {} accepted request {}", params.hospital_id, id);
    Ok(Json(updated))
}

async fn list_hospitals_handler(State(state): State<AppState>) -> Json<Vec<Hospital>> {
    Json(state.hospitals.list().await)
}

async fn register_hospital_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewHospital>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Hospital>)> {
    let Json(hospital) = payload?;
    let registered = state.hospitals.register(hospital).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn nearest_hospitals_handler(
    State(state): State<AppState>,
    params: Result<Query<NearestParams>, QueryRejection>,
) -> ApiResult<Json<Vec<HospitalDistance>>> {
    let Query(params) = params?;
    let origin = Coordinates::new(params.latitude, params.longitude).map_err(DispatchError::from)?;
    Ok(Json(state.hospitals.nearest(origin).await))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    let requests = || -> MethodRouter<AppState> {
        get(list_requests_handler).post(create_request_handler)
    };
    let request = || -> MethodRouter<AppState> {
        get(get_request_handler)
            .patch(transition_request_handler)
            .put(transition_request_handler)
    };

    // `/api/requests` is the same resource under its protocol name.
    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/emergencies", requests())
        .route("/api/emergencies/:id", request())
        .route("/api/requests", requests())
        .route("/api/requests/:id", request())
        .route("/api/hospitals", get(list_hospitals_handler).post(register_hospital_handler))
        .route("/api/hospitals/nearest", get(nearest_hospitals_handler))
        .route("/api/hospitals/accept/:id", put(hospital_accept_handler))
        .with_state(state)
        .layer(cors)
}

pub async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, AnyhowError> {
    TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))
}

/// Serves the API on `listener` until `shutdown_rx` fires, then flushes the
/// store.
pub async fn start_server(
    listener: TcpListener,
    state: AppState,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), AnyhowError> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    let store = Arc::clone(&state.store);
    let app = build_router(state);
    info!("REST API server listening on {} ({} store)", addr, store.get_type());

    let shutdown_signal = async {
        if shutdown_rx.await.is_ok() {
            info!("Received shutdown signal.");
        }
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("REST API server failed to start or run")?;

    store.flush().await.context("Failed to flush request store")?;
    info!("REST API server stopped.");
    Ok(())
}
