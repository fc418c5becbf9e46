// client/src/location.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use models::Coordinates;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable: {0}")]
    Unavailable(String),
    #[error("Timed out waiting for a position")]
    Timeout,
}

/// Anything that can report where this device is.
#[async_trait]
pub trait LocationSource: Send + Sync + 'static {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Always reports the same position, e.g. one given on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationSource(pub Coordinates);

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// A device with no positioning at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationSource;

#[async_trait]
impl LocationSource for NoLocationSource {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable("no location source configured".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinates: Coordinates,
    /// Set when `coordinates` is the fallback rather than a real reading.
    pub degraded: bool,
}

/// Wraps a source and substitutes the fallback on any failure.
#[derive(Clone)]
pub struct LocationResolver {
    source: Arc<dyn LocationSource>,
    fallback: Coordinates,
    timeout: Duration,
}

impl LocationResolver {
    pub fn new(source: Arc<dyn LocationSource>, fallback: Coordinates, timeout: Duration) -> Self {
        LocationResolver { source, fallback, timeout }
    }

    pub async fn locate(&self) -> LocationFix {
        let reading = match tokio::time::timeout(self.timeout, self.source.current_position()).await {
            Ok(reading) => reading,
            Err(_) => Err(LocationError::Timeout),
        };
        match reading.and_then(|c| {
            c.validate()
                .map(|_| c)
                .map_err(|e| LocationError::Unavailable(e.to_string()))
        }) {
            Ok(coordinates) => LocationFix { coordinates, degraded: false },
            Err(e) => {
                warn!("Using fallback location {}: {}", self.fallback, e);
                LocationFix { coordinates: self.fallback, degraded: true }
            }
        }
    }

    /// Locates now and then every `interval`, publishing each fix.
    pub async fn watch(&self, interval: Duration) -> LocationWatch {
        let first = self.locate().await;
        let (tx, rx) = watch::channel(first);
        let resolver = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick is immediate and `first` already covers it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let fix = resolver.locate().await;
                if tx.send(fix).is_err() {
                    debug!("Location watcher has no listeners, stopping");
                    break;
                }
            }
        });
        LocationWatch { rx, handle }
    }
}

/// A running position stream. Dropping it stops the stream.
pub struct LocationWatch {
    rx: watch::Receiver<LocationFix>,
    handle: JoinHandle<()>,
}

impl LocationWatch {
    pub fn latest(&self) -> LocationFix {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationFix> {
        self.rx.clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
