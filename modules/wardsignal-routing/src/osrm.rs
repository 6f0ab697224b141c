use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use wardsignal_common::{GeoPoint, RouteProvider, RouteResult};

const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Routing provider backed by an OSRM `/route/v1` endpoint.
pub struct OsrmRouter {
    http: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmRouter {
    pub fn new(base_url: &str, profile: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
        }
    }

    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, self.profile, from.lng, from.lat, to.lng, to.lat
        )
    }
}

impl Default for OsrmRouter {
    fn default() -> Self {
        Self::new(DEFAULT_OSRM_URL, "driving")
    }
}

#[async_trait]
impl RouteProvider for OsrmRouter {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult> {
        let url = self.route_url(from, to);
        debug!(profile = %self.profile, "OSRM route request");

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("OSRM routing error ({}): {}", status, error_text));
        }

        let body: OsrmResponse = response.json().await?;
        into_route_result(body)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lng, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

fn into_route_result(body: OsrmResponse) -> Result<RouteResult> {
    if body.code != "Ok" {
        return Err(anyhow!(
            "OSRM returned {}: {}",
            body.code,
            body.message.unwrap_or_default()
        ));
    }

    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No route in OSRM response"))?;

    Ok(RouteResult {
        distance_meters: route.distance,
        duration_seconds: route.duration,
        geometry: route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| GeoPoint { lat, lng })
            .collect(),
    })
}
