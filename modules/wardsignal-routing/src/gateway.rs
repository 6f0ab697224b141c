use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use wardsignal_common::{GeoPoint, Provider, RetryPolicy, RouteProvider, RouteResult, TriageError};
use wardsignal_geo::haversine_distance;

use crate::format::{format_distance, format_duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Routed,
    StraightLine,
}

/// A route, or the straight-line fallback when the provider is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEstimate {
    pub distance_meters: f64,
    /// Unknown for straight-line estimates.
    pub duration_seconds: Option<f64>,
    pub geometry: Vec<GeoPoint>,
    pub source: RouteSource,
}

impl RouteEstimate {
    pub fn distance_text(&self) -> String {
        format_distance(self.distance_meters)
    }

    pub fn duration_text(&self) -> Option<String> {
        self.duration_seconds.map(format_duration)
    }
}

impl From<RouteResult> for RouteEstimate {
    fn from(route: RouteResult) -> Self {
        Self {
            distance_meters: route.distance_meters,
            duration_seconds: Some(route.duration_seconds),
            geometry: route.geometry,
            source: RouteSource::Routed,
        }
    }
}

/// Wraps the routing provider with timeout + bounded retry.
#[derive(Clone)]
pub struct RoutingGateway {
    provider: Arc<dyn RouteProvider>,
    retry: RetryPolicy,
}

impl RoutingGateway {
    pub fn new(provider: Arc<dyn RouteProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Route between two points.
    ///
    /// Malformed coordinates fail immediately with `Validation`. Provider
    /// errors and timeouts are retried, then surface as
    /// `ProviderUnavailable { provider: Routing }`.
    pub async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, TriageError> {
        from.validate()?;
        to.validate()?;

        let provider = &self.provider;
        self.retry
            .call("route", move || provider.route(from, to))
            .await
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "Routing provider unavailable");
                TriageError::provider(Provider::Routing, e)
            })
    }

    /// Route, degrading to great-circle distance when the provider is down.
    /// Only validation errors propagate.
    pub async fn route_or_straight_line(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<RouteEstimate, TriageError> {
        match self.route(from, to).await {
            Ok(route) => Ok(route.into()),
            Err(TriageError::ProviderUnavailable { .. }) => {
                let distance_meters = haversine_distance(from, to);
                debug!(distance_meters, "Using straight-line distance fallback");
                Ok(RouteEstimate {
                    distance_meters,
                    duration_seconds: None,
                    geometry: Vec::new(),
                    source: RouteSource::StraightLine,
                })
            }
            Err(e) => Err(e),
        }
    }
}
