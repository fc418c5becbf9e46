// client/src/main.rs
// Command-line client for submitters, ambulance crews and hospitals.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use client::actions::{self, ActionOutcome};
use client::api::{DispatchApi, HttpDispatchClient};
use client::location::{FixedLocationSource, LocationResolver, LocationSource, NoLocationSource};
use client::sync::{ClientView, SessionIdentity, SyncSession, SyncSettings};
use lib::config::{load_dispatch_config, DispatchConfig};
use lib::geo::distance_km;
use lib::routing::{OsrmRouteProvider, RouteResolver, RouteTracker};
use models::{ActorId, ActorRole, Coordinates, NatureOfEmergency};

// Where the crew is drawn relative to the patient when no unit position is
// given: about 2 km south-west.
const SIMULATED_UNIT_OFFSET_DEGREES: f64 = 0.018;

#[derive(Parser, Debug)]
#[command(name = "dispatch-client")]
#[command(version = "0.1.0")]
#[command(about = "Emergency dispatch client")]
struct ClientArgs {
    /// Path to a dispatch YAML config (defaults to config/dispatch.yaml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
    /// Server root URL, overriding the configured REST API address
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Args, Debug, Clone, Copy)]
struct PositionArgs {
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,
}

impl PositionArgs {
    fn source(&self) -> Arc<dyn LocationSource> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                Arc::new(FixedLocationSource(Coordinates { latitude, longitude }))
            }
            _ => Arc::new(NoLocationSource),
        }
    }
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Poll the store as a role and print every new view
    Watch {
        /// user, ambulance or hospital
        #[arg(long)]
        role: ActorRole,
        /// Your user, unit or hospital identifier
        #[arg(long)]
        id: ActorId,
    },
    /// Report an emergency at your position
    Report {
        #[arg(long)]
        user: ActorId,
        /// Accident, Cardiac, Fire, Pregnancy or Other
        #[arg(long, default_value = "Other")]
        nature: NatureOfEmergency,
        #[command(flatten)]
        position: PositionArgs,
    },
    /// Accept a pending request as an ambulance unit
    Accept {
        #[arg(long)]
        ambulance: ActorId,
        request_id: u64,
    },
    /// Accept a request on behalf of a hospital
    HospitalAccept {
        #[arg(long)]
        hospital_id: u64,
        #[arg(long)]
        doctor: String,
        request_id: u64,
    },
    /// Mark an accepted request completed
    Complete {
        #[arg(long, default_value = "ambulance")]
        role: ActorRole,
        request_id: u64,
    },
    /// Resolve the road route from a unit to a request
    Route {
        request_id: u64,
        #[command(flatten)]
        unit: PositionArgs,
    },
    /// List hospitals, nearest first when a position is given
    Hospitals {
        #[command(flatten)]
        position: PositionArgs,
    },
}

fn print_view(identity: &SessionIdentity, view: &ClientView) {
    let synced = view
        .synced_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("--- {} {} (synced {}) ---", identity.role, identity.actor_id, synced);
    for request in &view.requests {
        println!(
            "#{} {} {} at {} ambulance={} hospital={}",
            request.id,
            request.status,
            request.nature_of_emergency,
            request.coordinates,
            request.assigned_ambulance_id.as_ref().map(|a| a.as_str()).unwrap_or("-"),
            request.hospital_id.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
    if let Some(active) = &view.active_request {
        println!("Active request: #{} ({})", active.id, active.status);
    }
}

fn print_outcome(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Applied(request) => println!(
            "Request #{} is now {} (version {})",
            request.id, request.status, request.version
        ),
        ActionOutcome::Rejected(reason) => println!("Rejected: {}", reason),
        ActionOutcome::Failed(reason) => println!("Failed: {}", reason),
    }
}

async fn watch(config: &DispatchConfig, api: Arc<dyn DispatchApi>, identity: SessionIdentity) -> Result<()> {
    let settings = SyncSettings::for_role(&config.sync, identity.role);
    let session = SyncSession::spawn(api, identity.clone(), settings);
    let mut views = session.subscribe();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = Arc::clone(&*views.borrow_and_update());
                print_view(&identity, &view);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping sync.");
                break;
            }
        }
    }
    session.stop().await;
    Ok(())
}

async fn route(config: &DispatchConfig, api: &dyn DispatchApi, request_id: u64, unit: PositionArgs) -> Result<()> {
    let request = api
        .list_requests()
        .await?
        .into_iter()
        .find(|r| r.id == request_id)
        .with_context(|| format!("Request {} is not in the store", request_id))?;
    let simulated = Coordinates {
        latitude: request.coordinates.latitude - SIMULATED_UNIT_OFFSET_DEGREES,
        longitude: request.coordinates.longitude - SIMULATED_UNIT_OFFSET_DEGREES,
    };
    let from = LocationResolver::new(unit.source(), simulated, config.location.timeout())
        .locate()
        .await
        .coordinates;

    let provider = OsrmRouteProvider::new(config.routing.base_url.clone(), config.routing.timeout())
        .context("Failed to build routing client")?;
    let resolver = RouteResolver::new(Arc::new(provider), config.routing.timeout());
    let mut tracker = RouteTracker::new();
    let geometry = tracker.refresh(&resolver, from, request.coordinates).await;

    println!(
        "Route {} -> {}: {} points ({:?}), straight-line distance {} km",
        from,
        request.coordinates,
        geometry.points.len(),
        geometry.source,
        distance_km(from, request.coordinates)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = ClientArgs::parse();

    let config = load_dispatch_config(args.config)?;
    let server = args.server.unwrap_or_else(|| config.rest_api.base_url());
    let api: Arc<dyn DispatchApi> = Arc::new(
        HttpDispatchClient::new(server.clone(), config.sync.request_timeout())
            .with_context(|| format!("Failed to create client for {}", server))?,
    );

    match args.command {
        ClientCommand::Watch { role, id } => {
            watch(&config, api, SessionIdentity::new(role, id)).await?;
        }
        ClientCommand::Report { user, nature, position } => {
            let fix = LocationResolver::new(position.source(), config.location.fallback, config.location.timeout())
                .locate()
                .await;
            if fix.degraded {
                println!("Location unavailable, reporting from fallback {}", fix.coordinates);
            }
            print_outcome(&actions::report_emergency(api.as_ref(), &user, fix.coordinates, nature).await);
        }
        ClientCommand::Accept { ambulance, request_id } => {
            print_outcome(&actions::accept_request(api.as_ref(), &ambulance, request_id).await);
        }
        ClientCommand::HospitalAccept { hospital_id, doctor, request_id } => {
            print_outcome(&actions::accept_by_hospital(api.as_ref(), hospital_id, &doctor, request_id).await);
        }
        ClientCommand::Complete { role, request_id } => {
            print_outcome(&actions::complete_request(api.as_ref(), role, request_id).await);
        }
        ClientCommand::Route { request_id, unit } => {
            route(&config, api.as_ref(), request_id, unit).await?;
        }
        ClientCommand::Hospitals { position } => {
            match (position.latitude, position.longitude) {
                (Some(latitude), Some(longitude)) => {
                    for entry in api.nearest_hospitals(Coordinates { latitude, longitude }).await? {
                        println!("#{} {} ({} km) {}", entry.hospital.id, entry.hospital.name, entry.distance_km, entry.hospital.address);
                    }
                }
                _ => {
                    for hospital in api.list_hospitals().await? {
                        println!("#{} {} at {} {}", hospital.id, hospital.name, hospital.coordinates, hospital.address);
                    }
                }
            }
        }
    }
    Ok(())
}
