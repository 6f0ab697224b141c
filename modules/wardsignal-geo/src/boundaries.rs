//! Ward and district boundary index.
//!
//! Built once at startup through an explicit constructor and shared
//! read-only (`Arc<BoundaryIndex>`) afterwards. Lookups scan units in
//! definition order; a bounding-box check skips ray casting for units that
//! cannot contain the point.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use wardsignal_common::{AdminLevel, AdminUnit, GeoPoint, Polygon, Report, TriageError};

use crate::geometry::{point_in_polygon, BoundingBox};
use crate::stats::{StatsAccumulator, UnitStats};

struct IndexedUnit {
    unit: AdminUnit,
    bbox: Option<BoundingBox>,
}

impl IndexedUnit {
    fn new(unit: AdminUnit) -> Self {
        let bbox = BoundingBox::of(&unit.polygon);
        Self { unit, bbox }
    }

    fn contains(&self, point: GeoPoint) -> bool {
        match self.bbox {
            Some(bbox) if bbox.contains(point) => point_in_polygon(point, &self.unit.polygon),
            _ => false,
        }
    }
}

pub struct BoundaryIndex {
    wards: Vec<IndexedUnit>,
    districts: Vec<IndexedUnit>,
}

impl BoundaryIndex {
    /// Build from units in definition order.
    ///
    /// Rejects duplicate ids within a level and wards whose `parent_id` names
    /// an unknown district.
    pub fn new(units: Vec<AdminUnit>) -> Result<Self, TriageError> {
        let mut wards = Vec::new();
        let mut districts = Vec::new();
        let mut seen: HashSet<(AdminLevel, String)> = HashSet::new();

        for unit in units {
            if !seen.insert((unit.level, unit.id.clone())) {
                return Err(TriageError::Validation(format!(
                    "duplicate {} id {}",
                    unit.level, unit.id
                )));
            }
            match unit.level {
                AdminLevel::Ward => wards.push(IndexedUnit::new(unit)),
                AdminLevel::District => districts.push(IndexedUnit::new(unit)),
            }
        }

        for ward in &wards {
            if let Some(parent) = &ward.unit.parent_id {
                if !seen.contains(&(AdminLevel::District, parent.clone())) {
                    return Err(TriageError::Validation(format!(
                        "ward {} references unknown district {parent}",
                        ward.unit.id
                    )));
                }
            }
        }

        info!(
            wards = wards.len(),
            districts = districts.len(),
            "Boundary index built"
        );

        Ok(Self { wards, districts })
    }

    /// Parse a GeoJSON FeatureCollection of Polygon/MultiPolygon features.
    pub fn from_geojson_str(json: &str) -> Result<Self, TriageError> {
        let collection: FeatureCollection = serde_json::from_str(json)
            .map_err(|e| TriageError::Validation(format!("invalid boundary GeoJSON: {e}")))?;

        let units = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, raw)| parse_feature(raw).map_err(|e| feature_error(i, e)))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(units)
    }

    pub fn from_geojson_path(path: impl AsRef<Path>) -> Result<Self, TriageError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Validation(format!(
                "cannot read boundary file {}: {e}",
                path.display()
            ))
        })?;
        info!(path = %path.display(), "Loading boundaries");
        Self::from_geojson_str(&json)
    }

    /// First ward, in definition order, whose polygon contains `point`.
    pub fn resolve_ward(&self, point: GeoPoint) -> Option<&AdminUnit> {
        first_containing(&self.wards, point)
    }

    /// First district, in definition order, whose polygon contains `point`.
    pub fn resolve_district(&self, point: GeoPoint) -> Option<&AdminUnit> {
        first_containing(&self.districts, point)
    }

    pub fn ward(&self, id: &str) -> Option<&AdminUnit> {
        find_by_id(&self.wards, id)
    }

    pub fn district(&self, id: &str) -> Option<&AdminUnit> {
        find_by_id(&self.districts, id)
    }

    pub fn wards(&self) -> impl Iterator<Item = &AdminUnit> {
        self.wards.iter().map(|u| &u.unit)
    }

    pub fn districts(&self) -> impl Iterator<Item = &AdminUnit> {
        self.districts.iter().map(|u| &u.unit)
    }

    /// The district a ward declares as its parent.
    pub fn district_for_ward(&self, ward: &AdminUnit) -> Option<&AdminUnit> {
        ward.parent_id.as_deref().and_then(|id| self.district(id))
    }

    /// Per-ward count, upvote total and mean severity.
    ///
    /// Every ward appears in the result, empty ones with zeroed stats.
    /// Reports without a coordinate, or outside every ward, are skipped.
    pub fn aggregate_stats(&self, reports: &[Report]) -> BTreeMap<String, UnitStats> {
        aggregate(&self.wards, reports)
    }

    /// Same aggregation over the district partition.
    pub fn aggregate_district_stats(&self, reports: &[Report]) -> BTreeMap<String, UnitStats> {
        aggregate(&self.districts, reports)
    }
}

fn first_containing(units: &[IndexedUnit], point: GeoPoint) -> Option<&AdminUnit> {
    units.iter().find(|u| u.contains(point)).map(|u| &u.unit)
}

fn find_by_id<'a>(units: &'a [IndexedUnit], id: &str) -> Option<&'a AdminUnit> {
    units.iter().find(|u| u.unit.id == id).map(|u| &u.unit)
}

fn aggregate(units: &[IndexedUnit], reports: &[Report]) -> BTreeMap<String, UnitStats> {
    let mut acc: Vec<StatsAccumulator> = units.iter().map(|_| StatsAccumulator::default()).collect();

    for report in reports {
        let Some(point) = report.location else {
            continue;
        };
        if let Some(idx) = units.iter().position(|u| u.contains(point)) {
            acc[idx].add(report.upvote_count, report.severity_score);
        }
    }

    units
        .iter()
        .zip(acc.iter())
        .map(|(u, a)| (u.unit.id.clone(), a.finish()))
        .collect()
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Feature {
    properties: FeatureProperties,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct FeatureProperties {
    id: UnitId,
    name: String,
    level: AdminLevel,
    #[serde(default)]
    parent_id: Option<UnitId>,
}

/// GeoJSON producers emit ids as either strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnitId {
    Text(String),
    Number(i64),
}

impl UnitId {
    fn into_string(self) -> String {
        match self {
            UnitId::Text(s) => s,
            UnitId::Number(n) => n.to_string(),
        }
    }
}

/// `[lng, lat]` with an optional trailing altitude.
type Position = Vec<f64>;

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Geometry {
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

fn feature_error(index: usize, err: TriageError) -> TriageError {
    match err {
        TriageError::Validation(msg) => TriageError::Validation(format!("feature {index}: {msg}")),
        other => other,
    }
}

fn parse_feature(raw: serde_json::Value) -> Result<AdminUnit, TriageError> {
    let feature: Feature =
        serde_json::from_value(raw).map_err(|e| TriageError::Validation(e.to_string()))?;

    let rings = match feature.geometry {
        Geometry::Polygon(rings) => rings,
        Geometry::MultiPolygon(parts) => parts.into_iter().flatten().collect(),
    };

    let rings = rings
        .into_iter()
        .map(|ring| {
            ring.iter()
                .map(|pos| parse_position(pos))
                .collect::<Result<Vec<GeoPoint>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let props = feature.properties;
    Ok(AdminUnit {
        id: props.id.into_string(),
        name: props.name,
        level: props.level,
        parent_id: props.parent_id.map(UnitId::into_string),
        polygon: Polygon::new(rings),
    })
}

fn parse_position(pos: &[f64]) -> Result<GeoPoint, TriageError> {
    match pos {
        [lng, lat, ..] => GeoPoint::new(*lat, *lng),
        _ => Err(TriageError::Validation(format!(
            "position needs [lng, lat], got {pos:?}"
        ))),
    }
}
