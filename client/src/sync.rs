// client/src/sync.rs
// Per-role polling. Each session owns one task that lists the store on a
// fixed cadence and publishes a complete view through a watch channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use lib::config::SyncConfig;
use models::{ActorId, ActorRole, DispatchError, DispatchResult, EmergencyRequest};

use crate::api::DispatchApi;

/// Who is polling.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub role: ActorRole,
    pub actor_id: ActorId,
}

impl SessionIdentity {
    pub fn new(role: ActorRole, actor_id: ActorId) -> Self {
        SessionIdentity { role, actor_id }
    }

    /// Submitters see only their own requests; crews and hospitals see
    /// everything still open.
    pub fn admits(&self, request: &EmergencyRequest) -> bool {
        match self.role {
            ActorRole::User => request.user_id == self.actor_id,
            ActorRole::Ambulance | ActorRole::Hospital => request.is_open(),
        }
    }
}

/// A client's local, possibly stale picture of the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientView {
    pub requests: Vec<EmergencyRequest>,
    /// `None` until the first successful poll.
    pub synced_at: Option<DateTime<Utc>>,
    /// Submitter only.
    pub active_request: Option<EmergencyRequest>,
}

impl ClientView {
    pub fn build(identity: &SessionIdentity, requests: Vec<EmergencyRequest>, synced_at: DateTime<Utc>) -> Self {
        let requests: Vec<EmergencyRequest> = requests.into_iter().filter(|r| identity.admits(r)).collect();
        let active_request = match identity.role {
            ActorRole::User => active_request(&requests),
            ActorRole::Ambulance | ActorRole::Hospital => None,
        };
        ClientView {
            requests,
            synced_at: Some(synced_at),
            active_request,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }
}

/// The most recently created request, unless it is already completed.
pub fn active_request(requests: &[EmergencyRequest]) -> Option<EmergencyRequest> {
    requests
        .iter()
        .max_by_key(|r| (r.created_at, r.id))
        .filter(|r| r.is_open())
        .cloned()
}

/// Cadence and per-poll bound for one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl SyncSettings {
    pub fn for_role(config: &SyncConfig, role: ActorRole) -> Self {
        SyncSettings {
            interval: config.interval_for(role),
            request_timeout: config.request_timeout(),
        }
    }
}

/// One bounded poll: fetch, filter, derive.
pub async fn poll_once(
    api: &dyn DispatchApi,
    identity: &SessionIdentity,
    request_timeout: Duration,
) -> DispatchResult<ClientView> {
    let requests = match tokio::time::timeout(request_timeout, api.list_requests()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(DispatchError::Timeout(format!(
                "listing requests took longer than {:?}",
                request_timeout
            )))
        }
    };
    Ok(ClientView::build(identity, requests, Utc::now()))
}

struct Poller {
    api: Arc<dyn DispatchApi>,
    identity: SessionIdentity,
    settings: SyncSettings,
    view_tx: watch::Sender<Arc<ClientView>>,
    failures: Arc<AtomicU32>,
}

impl Poller {
    async fn cycle(&self) {
        match poll_once(self.api.as_ref(), &self.identity, self.settings.request_timeout).await {
            Ok(view) => {
                let recovered = self.failures.swap(0, Ordering::SeqCst);
                if recovered > 0 {
                    info!(
                        "{} {} back in sync after {} failed polls",
                        self.identity.role, self.identity.actor_id, recovered
                    );
                }
                debug!(
                    "{} {} synced {} requests",
                    self.identity.role,
                    self.identity.actor_id,
                    view.requests.len()
                );
                self.view_tx.send_replace(Arc::new(view));
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    "{} {} poll failed ({} in a row), keeping last view: {}",
                    self.identity.role, self.identity.actor_id, failures, e
                );
            }
        }
    }

    async fn run(self, refresh: Arc<Notify>, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
                _ = refresh.notified() => {
                    ticker.reset();
                }
            }
            // A poll still in flight when stop arrives is dropped unpublished.
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = self.cycle() => {}
            }
        }
        debug!("{} {} sync loop stopped", self.identity.role, self.identity.actor_id);
    }
}

/// A running poll loop. Dropping the session aborts its task.
pub struct SyncSession {
    identity: SessionIdentity,
    view_rx: watch::Receiver<Arc<ClientView>>,
    failures: Arc<AtomicU32>,
    refresh: Arc<Notify>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// Starts polling immediately, then every `settings.interval`.
    pub fn spawn(api: Arc<dyn DispatchApi>, identity: SessionIdentity, settings: SyncSettings) -> Self {
        let (view_tx, view_rx) = watch::channel(Arc::new(ClientView::default()));
        let failures = Arc::new(AtomicU32::new(0));
        let refresh = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel();

        info!(
            "Starting {} sync for {} every {:?}",
            identity.role, identity.actor_id, settings.interval
        );
        let poller = Poller {
            api,
            identity: identity.clone(),
            settings,
            view_tx,
            failures: Arc::clone(&failures),
        };
        let handle = tokio::spawn(poller.run(Arc::clone(&refresh), stop_rx));

        SyncSession {
            identity,
            view_rx,
            failures,
            refresh,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// The latest complete view.
    pub fn view(&self) -> Arc<ClientView> {
        Arc::clone(&*self.view_rx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ClientView>> {
        self.view_rx.clone()
    }

    /// Polls now instead of waiting for the next tick.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Stops the loop, discarding any poll in flight, and waits for the task
    /// to exit.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sync task for {} ended abnormally: {}", self.identity.actor_id, e);
            }
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use models::{
        Coordinates, Hospital, HospitalDistance, NatureOfEmergency, NewEmergencyRequest, RequestStatus,
        TransitionPatch,
    };
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    fn actor(value: &str) -> ActorId {
        ActorId::new(value.to_string()).unwrap()
    }

    fn request(id: u64, user: &str, status: RequestStatus, created_secs: i64) -> EmergencyRequest {
        let mut request = EmergencyRequest::from_new(
            id,
            NewEmergencyRequest {
                user_id: actor(user),
                coordinates: Coordinates { latitude: 12.97, longitude: 77.59 },
                nature_of_emergency: NatureOfEmergency::Accident,
            },
            Utc.timestamp_opt(created_secs, 0).unwrap(),
        );
        request.status = status;
        request
    }

    /// Serves a fixed list and can be switched off or slowed down.
    struct FlakyApi {
        requests: Mutex<Vec<EmergencyRequest>>,
        down: AtomicBool,
        latency: Mutex<Duration>,
        calls: AtomicU32,
    }

    impl FlakyApi {
        fn new(requests: Vec<EmergencyRequest>) -> Arc<Self> {
            Arc::new(FlakyApi {
                requests: Mutex::new(requests),
                down: AtomicBool::new(false),
                latency: Mutex::new(Duration::ZERO),
                calls: AtomicU32::new(0),
            })
        }

        fn push(&self, request: EmergencyRequest) {
            self.requests.lock().unwrap().push(request);
        }
    }

    #[async_trait]
    impl DispatchApi for FlakyApi {
        async fn list_requests(&self) -> DispatchResult<Vec<EmergencyRequest>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let latency = *self.latency.lock().unwrap();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if self.down.load(Ordering::SeqCst) {
                return Err(DispatchError::NetworkError("connection refused".into()));
            }
            Ok(self.requests.lock().unwrap().clone())
        }

        async fn create_request(&self, _: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn transition(&self, _: u64, _: TransitionPatch) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn accept_by_hospital(&self, _: u64, _: u64, _: &str) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn list_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
            Ok(Vec::new())
        }

        async fn nearest_hospitals(&self, _: Coordinates) -> DispatchResult<Vec<HospitalDistance>> {
            Ok(Vec::new())
        }
    }

    /// Never answers.
    struct HangingApi;

    #[async_trait]
    impl DispatchApi for HangingApi {
        async fn list_requests(&self) -> DispatchResult<Vec<EmergencyRequest>> {
            std::future::pending().await
        }

        async fn create_request(&self, _: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn transition(&self, _: u64, _: TransitionPatch) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn accept_by_hospital(&self, _: u64, _: u64, _: &str) -> DispatchResult<EmergencyRequest> {
            unimplemented!()
        }

        async fn list_hospitals(&self) -> DispatchResult<Vec<Hospital>> {
            unimplemented!()
        }

        async fn nearest_hospitals(&self, _: Coordinates) -> DispatchResult<Vec<HospitalDistance>> {
            unimplemented!()
        }
    }

    fn settings(interval_secs: u64) -> SyncSettings {
        SyncSettings {
            interval: Duration::from_secs(interval_secs),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn should_filter_by_role() {
        let requests = vec![
            request(1, "alice", RequestStatus::Pending, 10),
            request(2, "bob", RequestStatus::Accepted, 20),
            request(3, "alice", RequestStatus::Completed, 30),
        ];
        let now = Utc::now();

        let submitter = ClientView::build(&SessionIdentity::new(ActorRole::User, actor("alice")), requests.clone(), now);
        let ids: Vec<u64> = submitter.requests.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);

        for role in [ActorRole::Ambulance, ActorRole::Hospital] {
            let view = ClientView::build(&SessionIdentity::new(role, actor("unit-1")), requests.clone(), now);
            let ids: Vec<u64> = view.requests.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![1, 2]);
            assert!(view.active_request.is_none());
        }
    }

    #[test]
    fn should_track_latest_open_request_as_active() {
        let older = request(1, "alice", RequestStatus::Pending, 10);
        let newer = request(2, "alice", RequestStatus::Accepted, 20);
        assert_eq!(active_request(&[older.clone(), newer.clone()]), Some(newer.clone()));

        // Once the newest completes nothing is active, even if older ones are open.
        let completed = request(2, "alice", RequestStatus::Completed, 20);
        assert_eq!(active_request(&[older.clone(), completed]), None);

        // Same timestamp: the higher id wins.
        let tie = request(3, "alice", RequestStatus::Pending, 20);
        assert_eq!(active_request(&[tie.clone(), newer]), Some(tie));
        assert_eq!(active_request(&[]), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_last_view_through_outage_then_resume() {
        let api = FlakyApi::new(vec![request(1, "alice", RequestStatus::Pending, 10)]);
        let session = SyncSession::spawn(
            api.clone(),
            SessionIdentity::new(ActorRole::User, actor("alice")),
            settings(3),
        );
        let mut rx = session.subscribe();
        rx.changed().await.unwrap();
        let good = session.view();
        assert_eq!(good.requests.len(), 1);
        assert_eq!(good.active_request.as_ref().map(|r| r.id), Some(1));

        api.down.store(true, Ordering::SeqCst);
        api.push(request(2, "alice", RequestStatus::Pending, 20));
        // Ticks at 3s, 6s and 9s all fail.
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(session.consecutive_failures(), 3);
        assert!(Arc::ptr_eq(&good, &session.view()));
        assert!(!rx.has_changed().unwrap());

        api.down.store(false, Ordering::SeqCst);
        rx.changed().await.unwrap();
        let resumed = session.view();
        assert_eq!(session.consecutive_failures(), 0);
        assert_eq!(resumed.requests.len(), 2);
        assert_eq!(resumed.active_request.as_ref().map(|r| r.id), Some(2));
        assert_eq!(api.calls.load(Ordering::SeqCst), 5);
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_poll_on_refresh_without_waiting_for_tick() {
        let api = FlakyApi::new(Vec::new());
        let session = SyncSession::spawn(
            api.clone(),
            SessionIdentity::new(ActorRole::Hospital, actor("hospital-1")),
            settings(5),
        );
        let mut rx = session.subscribe();
        rx.changed().await.unwrap();
        let start = tokio::time::Instant::now();

        api.push(request(7, "bob", RequestStatus::Pending, 10));
        session.refresh();
        rx.changed().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(session.view().requests.len(), 1);
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_count_timeouts_as_failures() {
        let session = SyncSession::spawn(
            Arc::new(HangingApi),
            SessionIdentity::new(ActorRole::Ambulance, actor("unit-1")),
            settings(5),
        );
        // First poll starts at 0s and gives up at 1s.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(session.consecutive_failures(), 1);
        assert!(!session.view().is_synced());
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_publish_after_stop() {
        let api = FlakyApi::new(vec![request(1, "alice", RequestStatus::Pending, 10)]);
        let session = SyncSession::spawn(
            api.clone(),
            SessionIdentity::new(ActorRole::Ambulance, actor("unit-1")),
            settings(5),
        );
        let mut rx = session.subscribe();
        rx.changed().await.unwrap();
        session.stop().await;

        let calls = api.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), calls);
        // The task owned the only sender.
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn should_discard_poll_in_flight_on_stop() {
        let api = FlakyApi::new(vec![request(1, "alice", RequestStatus::Pending, 10)]);
        let session = SyncSession::spawn(
            api.clone(),
            SessionIdentity::new(ActorRole::Ambulance, actor("unit-1")),
            SyncSettings { interval: Duration::from_secs(1), request_timeout: Duration::from_secs(5) },
        );
        let mut rx = session.subscribe();
        rx.changed().await.unwrap();
        let before = session.view();

        // The second poll starts at 1s and would answer at 3s.
        *api.latency.lock().unwrap() = Duration::from_secs(2);
        api.push(request(2, "bob", RequestStatus::Pending, 20));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        let stopping = tokio::time::Instant::now();
        session.stop().await;
        assert!(stopping.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(Arc::ptr_eq(&before, &*rx.borrow()));
        assert_eq!(rx.borrow().requests.len(), 1);
        assert!(rx.changed().await.is_err());
    }

    #[test]
    fn should_pick_interval_per_role() {
        let config = SyncConfig {
            submitter_interval_ms: 3_000,
            dispatcher_interval_ms: 5_000,
            request_timeout_ms: 4_000,
        };
        assert_eq!(SyncSettings::for_role(&config, ActorRole::User).interval, Duration::from_secs(3));
        assert_eq!(SyncSettings::for_role(&config, ActorRole::Ambulance).interval, Duration::from_secs(5));
        assert_eq!(SyncSettings::for_role(&config, ActorRole::Hospital).request_timeout, Duration::from_secs(4));
    }
}
