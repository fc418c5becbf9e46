// lib/src/hospitals.rs
// Reference list of hospitals. Read-mostly; registration only appends.

use std::sync::Arc;

use log::info;
use tokio::sync::RwLock;

use models::{Coordinates, DispatchResult, Hospital, HospitalDistance, NewHospital};

use crate::geo::{distance_km, rank_by_distance};

#[derive(Debug, Default)]
struct Directory {
    hospitals: Vec<Hospital>,
    next_id: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HospitalDirectory {
    inner: Arc<RwLock<Directory>>,
}

impl HospitalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from configured seeds, assigning ids from 1.
    pub async fn with_seed(seed: Vec<NewHospital>) -> DispatchResult<Self> {
        let directory = Self::new();
        for hospital in seed {
            directory.register(hospital).await?;
        }
        Ok(directory)
    }

    pub async fn register(&self, hospital: NewHospital) -> DispatchResult<Hospital> {
        hospital.validate()?;
        let mut directory = self.inner.write().await;
        directory.next_id += 1;
        let registered = Hospital {
            id: directory.next_id,
            name: hospital.name.trim().to_string(),
            address: hospital.address.trim().to_string(),
            coordinates: hospital.coordinates,
        };
        directory.hospitals.push(registered.clone());
        info!("Registered hospital {} ({})", registered.id, registered.name);
        Ok(registered)
    }

    pub async fn list(&self) -> Vec<Hospital> {
        self.inner.read().await.hospitals.clone()
    }

    pub async fn get(&self, id: u64) -> Option<Hospital> {
        self.inner
            .read()
            .await
            .hospitals
            .iter()
            .find(|h| h.id == id)
            .cloned()
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.get(id).await.is_some()
    }

    /// Every hospital, nearest to `origin` first, with display distances.
    pub async fn nearest(&self, origin: Coordinates) -> Vec<HospitalDistance> {
        let hospitals = self.list().await;
        rank_by_distance(origin, hospitals, |h| h.coordinates)
            .into_iter()
            .map(|(hospital, _)| {
                let distance_km = distance_km(origin, hospital.coordinates);
                HospitalDistance { hospital, distance_km }
            })
            .collect()
    }
}
