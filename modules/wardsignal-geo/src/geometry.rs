//! Planar point-in-polygon and great-circle distance.
//!
//! Polygons are treated as planar in (lng, lat) space. Boundaries crossing the
//! antimeridian are not supported.

use wardsignal_common::{GeoPoint, Polygon};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Tolerance (degrees) for deciding that a point lies on an edge.
const BOUNDARY_EPSILON: f64 = 1e-12;

/// Haversine great-circle distance between two points in meters.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.min(1.0).sqrt().asin();
    EARTH_RADIUS_METERS * c
}

/// Odd-even containment test across all rings of `polygon`.
///
/// - A point exactly on an edge or vertex of any ring is inside.
/// - Otherwise each ring is ray-cast independently and the results are
///   combined by XOR, so nested rings are holes and disjoint rings are parts.
/// - Rings with fewer than three vertices or zero area are ignored; a polygon
///   with no usable ring contains nothing.
pub fn point_in_polygon(point: GeoPoint, polygon: &Polygon) -> bool {
    let rings: Vec<&[GeoPoint]> = polygon
        .rings
        .iter()
        .map(|ring| open_ring(ring))
        .filter(|ring| is_usable(ring))
        .collect();

    if rings.is_empty() {
        return false;
    }

    if rings.iter().any(|ring| on_ring_boundary(point, ring)) {
        return true;
    }

    rings
        .iter()
        .fold(false, |inside, ring| inside ^ ring_contains(point, ring))
}

/// Drop a repeated closing vertex if present.
fn open_ring(ring: &[GeoPoint]) -> &[GeoPoint] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

fn is_usable(ring: &[GeoPoint]) -> bool {
    ring.len() >= 3 && signed_area(ring).abs() > f64::EPSILON * f64::EPSILON
}

/// Shoelace area in square degrees; sign gives orientation.
fn signed_area(ring: &[GeoPoint]) -> f64 {
    let n = ring.len();
    let mut twice_area = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        twice_area += a.lng * b.lat - b.lng * a.lat;
    }
    twice_area / 2.0
}

fn ring_contains(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let crossing_lng = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < crossing_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_ring_boundary(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    let n = ring.len();
    (0..n).any(|i| on_segment(point, ring[i], ring[(i + 1) % n]))
}

fn on_segment(p: GeoPoint, a: GeoPoint, b: GeoPoint) -> bool {
    let cross = (b.lng - a.lng) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lng - a.lng);
    if cross.abs() > BOUNDARY_EPSILON {
        return false;
    }
    p.lng >= a.lng.min(b.lng) - BOUNDARY_EPSILON
        && p.lng <= a.lng.max(b.lng) + BOUNDARY_EPSILON
        && p.lat >= a.lat.min(b.lat) - BOUNDARY_EPSILON
        && p.lat <= a.lat.max(b.lat) + BOUNDARY_EPSILON
}

/// Axis-aligned envelope used to skip ray casting for far-away points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Envelope of every vertex in the polygon, or `None` if it has none.
    pub fn of(polygon: &Polygon) -> Option<Self> {
        let mut points = polygon.rings.iter().flatten();
        let first = points.next()?;
        let init = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        Some(points.fold(init, |bbox, p| Self {
            min_lat: bbox.min_lat.min(p.lat),
            max_lat: bbox.max_lat.max(p.lat),
            min_lng: bbox.min_lng.min(p.lng),
            max_lng: bbox.max_lng.max(p.lng),
        }))
    }

    /// Inclusive, so boundary points are never rejected early.
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }
}
