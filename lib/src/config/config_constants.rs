// lib/src/config/config_constants.rs

pub const DEFAULT_CONFIG_FILE: &str = "config/dispatch.yaml";
pub const DEFAULT_DATA_DIRECTORY: &str = "./data";

pub const DEFAULT_REST_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_REST_API_PORT: u16 = 8080;

pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_ROUTING_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_SUBMITTER_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_DISPATCHER_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_SYNC_REQUEST_TIMEOUT_MS: u64 = 4_000;

// Geographic centre of India, used when no position can be obtained.
pub const DEFAULT_FALLBACK_LATITUDE: f64 = 20.5937;
pub const DEFAULT_FALLBACK_LONGITUDE: f64 = 78.9629;
pub const DEFAULT_LOCATION_TIMEOUT_MS: u64 = 10_000;
