// client/tests/http_dispatch.rs
// End-to-end runs against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use client::actions::{self, ActionOutcome, ALREADY_TAKEN};
use client::api::{DispatchApi, HttpDispatchClient};
use client::sync::{SessionIdentity, SyncSession, SyncSettings};
use lib::hospitals::HospitalDirectory;
use lib::storage_engine::InMemoryRequestStore;
use models::{ActorId, ActorRole, Coordinates, NatureOfEmergency, NewHospital, RequestStatus};
use rest_api::{bind_listener, start_server, AppState};

struct Server {
    api: Arc<HttpDispatchClient>,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start() -> Server {
    let hospitals = HospitalDirectory::with_seed(vec![NewHospital {
        name: "City General".to_string(),
        address: "MG Road".to_string(),
        coordinates: Coordinates { latitude: 12.975, longitude: 77.605 },
    }])
    .await
    .unwrap();
    let state = AppState::new(Arc::new(InMemoryRequestStore::new()), hospitals);
    let listener = bind_listener("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(start_server(listener, state, shutdown_rx));
    let api = Arc::new(HttpDispatchClient::new(base, Duration::from_secs(2)).unwrap());
    Server { api, shutdown_tx, handle }
}

impl Server {
    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.handle.await.unwrap().unwrap();
    }
}

fn actor(value: &str) -> ActorId {
    ActorId::new(value.to_string()).unwrap()
}

#[tokio::test]
async fn should_run_full_scenario_over_http() {
    let server = start().await;
    let api = server.api.as_ref();

    let created = actions::report_emergency(
        api,
        &actor("alice"),
        Coordinates { latitude: 12.97, longitude: 77.59 },
        NatureOfEmergency::Pregnancy,
    )
    .await;
    let id = created.request().unwrap().id;

    assert!(actions::accept_request(api, &actor("A"), id).await.is_applied());
    assert_eq!(
        actions::accept_request(api, &actor("B"), id).await,
        ActionOutcome::Rejected(ALREADY_TAKEN.to_string())
    );

    let unknown = actions::accept_by_hospital(api, 9, "Dr. Rao", id).await;
    assert_eq!(unknown, ActionOutcome::Rejected("hospital 9 was not found".to_string()));

    let hospital = actions::accept_by_hospital(api, 1, "Dr. Rao", id).await;
    let with_hospital = hospital.request().unwrap();
    assert_eq!(with_hospital.assigned_ambulance_id, Some(actor("A")));
    assert_eq!(with_hospital.hospital_id, Some(1));

    let done = actions::complete_request(api, ActorRole::Ambulance, id).await;
    assert_eq!(done.request().unwrap().status, RequestStatus::Completed);

    let again = actions::complete_request(api, ActorRole::Ambulance, id).await;
    assert!(matches!(again, ActionOutcome::Rejected(_)));

    let frozen = &api.list_requests().await.unwrap()[0];
    assert_eq!(frozen.assigned_ambulance_id, Some(actor("A")));
    assert_eq!(frozen.doctor_name.as_deref(), Some("Dr. Rao"));
    assert_eq!(frozen.version, 4);

    server.stop().await;
}

#[tokio::test]
async fn should_sync_submitter_view_over_http() {
    let server = start().await;
    let api: Arc<dyn DispatchApi> = server.api.clone();

    let session = SyncSession::spawn(
        Arc::clone(&api),
        SessionIdentity::new(ActorRole::User, actor("alice")),
        SyncSettings { interval: Duration::from_secs(60), request_timeout: Duration::from_secs(2) },
    );
    let mut views = session.subscribe();
    views.changed().await.unwrap();
    assert!(session.view().is_synced());
    assert!(session.view().active_request.is_none());

    let mine = actions::report_emergency(
        api.as_ref(),
        &actor("alice"),
        Coordinates { latitude: 12.97, longitude: 77.59 },
        NatureOfEmergency::Accident,
    )
    .await;
    let id = mine.request().unwrap().id;
    actions::report_emergency(
        api.as_ref(),
        &actor("bob"),
        Coordinates { latitude: 12.99, longitude: 77.61 },
        NatureOfEmergency::Fire,
    )
    .await;

    session.refresh();
    views.changed().await.unwrap();
    let view = session.view();
    assert_eq!(view.requests.len(), 1);
    assert_eq!(view.active_request.as_ref().map(|r| r.id), Some(id));

    assert!(actions::accept_request(api.as_ref(), &actor("A"), id).await.is_applied());
    assert!(actions::complete_request(api.as_ref(), ActorRole::Ambulance, id).await.is_applied());
    session.refresh();
    views.changed().await.unwrap();
    assert!(session.view().active_request.is_none());
    assert_eq!(session.consecutive_failures(), 0);

    session.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn should_rank_hospitals_over_http() {
    let server = start().await;
    let ranked = server
        .api
        .nearest_hospitals(Coordinates { latitude: 12.97, longitude: 77.6 })
        .await
        .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].hospital.name, "City General");
    assert!(ranked[0].distance_km > 0.0);
    server.stop().await;
}
