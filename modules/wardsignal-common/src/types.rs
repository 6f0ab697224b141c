use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TriageError;

// --- Geo Types ---

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Build a validated point. Non-finite or out-of-range values are rejected.
    pub fn new(lat: f64, lng: f64) -> Result<Self, TriageError> {
        let point = Self { lat, lng };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(TriageError::Validation(format!(
                "coordinate must be finite, got ({}, {})",
                self.lat, self.lng
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(TriageError::Validation(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(TriageError::Validation(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

/// One closed vertex ring. The closing vertex may be repeated or omitted.
pub type Ring = Vec<GeoPoint>;

/// One or more rings. Containment is combined across rings by XOR, so a ring
/// nested inside another acts as a hole and disjoint rings act as extra parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    /// Convenience for a single-ring polygon.
    pub fn from_ring(ring: Ring) -> Self {
        Self { rings: vec![ring] }
    }
}

// --- Administrative Units ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    Ward,
    District,
}

impl std::fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminLevel::Ward => write!(f, "ward"),
            AdminLevel::District => write!(f, "district"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUnit {
    pub id: String,
    pub name: String,
    pub level: AdminLevel,
    /// Ward -> district. Districts have no parent.
    pub parent_id: Option<String>,
    pub polygon: Polygon,
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Reported,
    InReview,
    InProgress,
    Resolved,
    Rejected,
}

impl ReportStatus {
    /// Resolved and Rejected reports keep the score they had at transition time.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Resolved | ReportStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Reported => "reported",
            ReportStatus::InReview => "in_review",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reported" => Ok(ReportStatus::Reported),
            "in_review" => Ok(ReportStatus::InReview),
            "in_progress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(TriageError::Validation(format!(
                "unknown report status: {other}"
            ))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "low"),
            SeverityLevel::Medium => write!(f, "medium"),
            SeverityLevel::High => write!(f, "high"),
            SeverityLevel::Critical => write!(f, "critical"),
        }
    }
}

// --- Report ---

/// A citizen-submitted issue report.
///
/// The persistence layer owns creation and deletion. The triage core only
/// writes `embedding`, `severity_score`/`severity_updated_at`, category fields
/// on re-analysis, and `duplicate_of`/`upvote_count` on merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_confidence: Option<f32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub severity_score: f64,
    #[serde(default)]
    pub severity_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub upvote_count: u32,
    #[serde(default)]
    pub verification_count: u32,
    pub status: ReportStatus,
    #[serde(default)]
    pub duplicate_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// A freshly reported issue with no engagement yet.
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            location_text: None,
            location: None,
            embedding: None,
            category: None,
            category_confidence: None,
            image_url: None,
            severity_score: 0.0,
            severity_updated_at: None,
            upvote_count: 0,
            verification_count: 0,
            status: ReportStatus::Reported,
            duplicate_of: None,
            created_at,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// Eligible for duplicate search and severity re-ranking.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal() && !self.is_duplicate()
    }

    /// Text sent to the embedding provider: title, description and location
    /// text, blank parts dropped.
    pub fn embedding_text(&self) -> String {
        [
            Some(self.title.as_str()),
            Some(self.description.as_str()),
            self.location_text.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

// --- Transient results ---

/// A ranked duplicate candidate. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub report_id: Uuid,
    pub similarity: f64,
}

/// Result of one routing-provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub geometry: Vec<GeoPoint>,
}

/// Image-classifier output consumed as severity-scoring input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub confidence: f32,
    pub severity_hint: Option<SeverityLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn terminal_statuses() {
        assert!(ReportStatus::Resolved.is_terminal());
        assert!(ReportStatus::Rejected.is_terminal());
        assert!(!ReportStatus::InProgress.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ReportStatus::Reported,
            ReportStatus::InReview,
            ReportStatus::InProgress,
            ReportStatus::Resolved,
            ReportStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ReportStatus>().unwrap(), status);
        }
        assert!("closed".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn embedding_text_skips_blank_parts() {
        let mut report = Report::new(Uuid::new_v4(), " Pothole ", "", Utc::now());
        report.location_text = Some("Main St & 4th".to_string());
        assert_eq!(report.embedding_text(), "Pothole\nMain St & 4th");
    }

    #[test]
    fn duplicate_is_not_active() {
        let mut report = Report::new(Uuid::new_v4(), "a", "b", Utc::now());
        assert!(report.is_active());
        report.duplicate_of = Some(Uuid::new_v4());
        assert!(!report.is_active());
    }
}
