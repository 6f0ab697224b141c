use serde::Serialize;
use uuid::Uuid;
use wardsignal_common::{GeoPoint, Report};
use wardsignal_geo::haversine_distance;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestReport {
    pub report_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: f64,
}

/// Closest coordinate-bearing candidate by great-circle distance.
///
/// Equal distances go to the lowest report id. Candidates without a
/// coordinate are ignored; `None` when nothing is left.
pub fn find_nearest_report(origin: GeoPoint, candidates: &[Report]) -> Option<NearestReport> {
    candidates
        .iter()
        .filter_map(|report| {
            report.location.map(|loc| NearestReport {
                report_id: report.id,
                lat: loc.lat,
                lng: loc.lng,
                distance_meters: haversine_distance(origin, loc),
            })
        })
        .min_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then_with(|| a.report_id.cmp(&b.report_id))
        })
}
