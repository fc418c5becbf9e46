// lib/src/lib.rs
// Core dispatch engine shared by the server and the clients.

pub mod config;
pub mod dispatch;
pub mod geo;
pub mod hospitals;
pub mod routing;
pub mod storage_engine;

pub use config::{load_dispatch_config, DispatchConfig};
pub use dispatch::{apply_patch, fire, Trigger};
pub use geo::{bearing_degrees, distance_km, haversine_km};
pub use hospitals::HospitalDirectory;
pub use routing::{OsrmRouteProvider, RouteGeometry, RouteProvider, RouteResolver, RouteTracker};
pub use storage_engine::{create_request_store, RequestStore, StorageConfig, StorageEngineType};
