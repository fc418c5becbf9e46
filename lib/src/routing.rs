// lib/src/routing.rs
// Road routes between two points. The provider call is the only I/O here and
// sits behind `RouteProvider` so tests can swap in a deterministic stub.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use models::Coordinates;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Routing request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Routing service returned HTTP {0}")]
    Status(u16),
    #[error("Malformed routing response: {0}")]
    MalformedResponse(String),
    #[error("Routing request timed out after {0:?}")]
    Timeout(Duration),
}

/// Where a geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Road,
    StraightLine,
}

/// An ordered path, latitude first. Derived data, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub points: Vec<Coordinates>,
    pub source: RouteSource,
}

impl RouteGeometry {
    pub fn straight_line(from: Coordinates, to: Coordinates) -> Self {
        RouteGeometry {
            points: vec![from, to],
            source: RouteSource::StraightLine,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == RouteSource::StraightLine
    }
}

/// An external driving-route service.
#[async_trait]
pub trait RouteProvider: Send + Sync + 'static {
    async fn fetch_route(&self, from: Coordinates, to: Coordinates) -> Result<Vec<Coordinates>, RouteError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// Client for an OSRM-compatible `route/v1/driving` endpoint.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OsrmRouteProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RouteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(OsrmRouteProvider {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// OSRM takes `lon,lat` pairs.
    pub fn route_url(&self, from: Coordinates, to: Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.longitude, from.latitude, to.longitude, to.latitude
        )
    }
}

/// Pulls the first route's geometry out of an OSRM body and flips each
/// `[lon, lat]` pair to latitude-first.
pub fn parse_osrm_geometry(body: &serde_json::Value) -> Result<Vec<Coordinates>, RouteError> {
    let response: OsrmResponse = serde_json::from_value(body.clone())
        .map_err(|e| RouteError::MalformedResponse(e.to_string()))?;
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::MalformedResponse("no routes in response".to_string()))?;
    let geometry = route
        .geometry
        .ok_or_else(|| RouteError::MalformedResponse("route has no geometry".to_string()))?;

    let mut points = Vec::with_capacity(geometry.coordinates.len());
    for pair in geometry.coordinates {
        match pair.as_slice() {
            [lon, lat, ..] => {
                let point = Coordinates::new(*lat, *lon)
                    .map_err(|e| RouteError::MalformedResponse(e.to_string()))?;
                points.push(point);
            }
            _ => {
                return Err(RouteError::MalformedResponse(format!(
                    "coordinate pair has {} values",
                    pair.len()
                )))
            }
        }
    }
    if points.len() < 2 {
        return Err(RouteError::MalformedResponse(format!(
            "geometry has {} points",
            points.len()
        )));
    }
    Ok(points)
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn fetch_route(&self, from: Coordinates, to: Coordinates) -> Result<Vec<Coordinates>, RouteError> {
        let url = self.route_url(from, to);
        debug!("Requesting route from {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RouteError::Status(response.status().as_u16()));
        }
        let body: serde_json::Value = response.json().await?;
        parse_osrm_geometry(&body)
    }
}

/// Resolves routes through a provider and degrades to a straight line on any
/// failure. Holds no cache.
#[derive(Clone)]
pub struct RouteResolver {
    provider: Arc<dyn RouteProvider>,
    timeout: Duration,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn RouteProvider>, timeout: Duration) -> Self {
        RouteResolver { provider, timeout }
    }

    pub async fn resolve_route(&self, from: Coordinates, to: Coordinates) -> RouteGeometry {
        let outcome = match tokio::time::timeout(self.timeout, self.provider.fetch_route(from, to)).await {
            Ok(result) => result,
            Err(_) => Err(RouteError::Timeout(self.timeout)),
        };
        match outcome {
            Ok(points) if points.len() >= 2 => RouteGeometry {
                points,
                source: RouteSource::Road,
            },
            Ok(points) => {
                warn!(
                    "Route {} -> {} came back with {} points, drawing a straight line",
                    from,
                    to,
                    points.len()
                );
                RouteGeometry::straight_line(from, to)
            }
            Err(e) => {
                warn!("Route {} -> {} unavailable ({}), drawing a straight line", from, to, e);
                RouteGeometry::straight_line(from, to)
            }
        }
    }
}

/// Caller-side holder for a route between two moving endpoints. Any endpoint
/// change drops the current geometry.
#[derive(Debug, Clone, Default)]
pub struct RouteTracker {
    endpoints: Option<(Coordinates, Coordinates)>,
    geometry: Option<RouteGeometry>,
}

impl RouteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the endpoints and returns true when a fresh resolution is
    /// needed.
    pub fn set_endpoints(&mut self, from: Coordinates, to: Coordinates) -> bool {
        if self.endpoints == Some((from, to)) && self.geometry.is_some() {
            return false;
        }
        if self.endpoints != Some((from, to)) {
            self.endpoints = Some((from, to));
            self.geometry = None;
        }
        true
    }

    /// Stores a resolved geometry if it still matches the current endpoints.
    /// Results for stale endpoints are discarded.
    pub fn accept(&mut self, from: Coordinates, to: Coordinates, geometry: RouteGeometry) -> bool {
        if self.endpoints == Some((from, to)) {
            self.geometry = Some(geometry);
            true
        } else {
            false
        }
    }

    pub fn geometry(&self) -> Option<&RouteGeometry> {
        self.geometry.as_ref()
    }

    /// Sets the endpoints and resolves through `resolver` when they changed.
    pub async fn refresh(&mut self, resolver: &RouteResolver, from: Coordinates, to: Coordinates) -> &RouteGeometry {
        if self.set_endpoints(from, to) {
            let geometry = resolver.resolve_route(from, to).await;
            self.accept(from, to, geometry);
        }
        self.geometry
            .get_or_insert_with(|| RouteGeometry::straight_line(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates { latitude, longitude }
    }

    struct FailingProvider;

    #[async_trait]
    impl RouteProvider for FailingProvider {
        async fn fetch_route(&self, _from: Coordinates, _to: Coordinates) -> Result<Vec<Coordinates>, RouteError> {
            Err(RouteError::Status(503))
        }
    }

    struct FixedProvider {
        points: Vec<Coordinates>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RouteProvider for FixedProvider {
        async fn fetch_route(&self, _from: Coordinates, _to: Coordinates) -> Result<Vec<Coordinates>, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.points.clone())
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl RouteProvider for SlowProvider {
        async fn fetch_route(&self, from: Coordinates, to: Coordinates) -> Result<Vec<Coordinates>, RouteError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![from, to])
        }
    }

    #[tokio::test]
    async fn should_fall_back_to_straight_line_on_failure() {
        let resolver = RouteResolver::new(Arc::new(FailingProvider), Duration::from_secs(1));
        let (from, to) = (at(20.0, 78.0), at(20.1, 78.1));
        let route = resolver.resolve_route(from, to).await;
        assert_eq!(route.points, vec![from, to]);
        assert!(route.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn should_fall_back_when_provider_times_out() {
        let resolver = RouteResolver::new(Arc::new(SlowProvider), Duration::from_millis(500));
        let (from, to) = (at(20.0, 78.0), at(20.1, 78.1));
        let route = resolver.resolve_route(from, to).await;
        assert_eq!(route, RouteGeometry::straight_line(from, to));
    }

    #[tokio::test]
    async fn should_return_provider_path() {
        let path = vec![at(20.0, 78.0), at(20.05, 78.02), at(20.1, 78.1)];
        let provider = Arc::new(FixedProvider { points: path.clone(), calls: AtomicUsize::new(0) });
        let resolver = RouteResolver::new(provider, Duration::from_secs(1));
        let route = resolver.resolve_route(path[0], path[2]).await;
        assert_eq!(route.points, path);
        assert_eq!(route.source, RouteSource::Road);
    }

    #[tokio::test]
    async fn should_treat_single_point_path_as_failure() {
        let provider = Arc::new(FixedProvider { points: vec![at(20.0, 78.0)], calls: AtomicUsize::new(0) });
        let resolver = RouteResolver::new(provider, Duration::from_secs(1));
        let route = resolver.resolve_route(at(20.0, 78.0), at(21.0, 79.0)).await;
        assert!(route.is_fallback());
    }

    #[test]
    fn should_flip_osrm_coordinates_to_lat_lng() {
        let body = json!({
            "code": "Ok",
            "routes": [{ "geometry": { "type": "LineString", "coordinates": [[78.0, 20.0], [78.1, 20.1]] } }]
        });
        let points = parse_osrm_geometry(&body).unwrap();
        assert_eq!(points, vec![at(20.0, 78.0), at(20.1, 78.1)]);
    }

    #[test]
    fn should_reject_response_without_routes() {
        let body = json!({ "code": "NoRoute", "routes": [] });
        assert!(matches!(parse_osrm_geometry(&body), Err(RouteError::MalformedResponse(_))));
        let body = json!({ "routes": [{ "distance": 10.0 }] });
        assert!(matches!(parse_osrm_geometry(&body), Err(RouteError::MalformedResponse(_))));
    }

    #[test]
    fn should_build_lon_lat_url() {
        let provider = OsrmRouteProvider::new("http://router.local/", Duration::from_secs(1)).unwrap();
        let url = provider.route_url(at(20.0, 78.0), at(20.5, 78.5));
        assert_eq!(
            url,
            "http://router.local/route/v1/driving/78,20;78.5,20.5?overview=full&geometries=geojson"
        );
    }

    #[tokio::test]
    async fn should_only_reresolve_when_endpoints_change() {
        let path = vec![at(20.0, 78.0), at(20.1, 78.1)];
        let provider = Arc::new(FixedProvider { points: path.clone(), calls: AtomicUsize::new(0) });
        let resolver = RouteResolver::new(provider.clone(), Duration::from_secs(1));
        let mut tracker = RouteTracker::new();

        tracker.refresh(&resolver, path[0], path[1]).await;
        tracker.refresh(&resolver, path[0], path[1]).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        tracker.refresh(&resolver, at(20.2, 78.2), path[1]).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_discard_geometry_for_stale_endpoints() {
        let mut tracker = RouteTracker::new();
        let (a, b, c) = (at(1.0, 1.0), at(2.0, 2.0), at(3.0, 3.0));
        assert!(tracker.set_endpoints(a, b));
        assert!(tracker.set_endpoints(a, c));
        assert!(!tracker.accept(a, b, RouteGeometry::straight_line(a, b)));
        assert!(tracker.geometry().is_none());
        assert!(tracker.accept(a, c, RouteGeometry::straight_line(a, c)));
        assert!(!tracker.set_endpoints(a, c));
    }
}
