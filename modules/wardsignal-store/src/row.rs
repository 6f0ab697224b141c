use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wardsignal_common::{GeoPoint, Report, ReportStatus};

/// A row from the reports table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ReportRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location_text: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub embedding: Option<Vec<f32>>,
    pub category: Option<String>,
    pub category_confidence: Option<f32>,
    pub image_url: Option<String>,
    pub severity_score: f64,
    pub severity_updated_at: Option<DateTime<Utc>>,
    pub upvote_count: i32,
    pub verification_count: i32,
    pub status: String,
    pub duplicate_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub(crate) const REPORT_COLUMNS: &str = "id, title, description, location_text, lat, lng, \
     embedding, category, category_confidence, image_url, severity_score, severity_updated_at, \
     upvote_count, verification_count, status, duplicate_of, created_at";

impl TryFrom<ReportRow> for Report {
    type Error = anyhow::Error;

    fn try_from(row: ReportRow) -> Result<Self> {
        let status: ReportStatus = row.status.parse()?;
        let location = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };

        Ok(Report {
            id: row.id,
            title: row.title,
            description: row.description,
            location_text: row.location_text,
            location,
            embedding: row.embedding,
            category: row.category,
            category_confidence: row.category_confidence,
            image_url: row.image_url,
            severity_score: row.severity_score,
            severity_updated_at: row.severity_updated_at,
            upvote_count: to_count(row.upvote_count, "upvote_count")?,
            verification_count: to_count(row.verification_count, "verification_count")?,
            status,
            duplicate_of: row.duplicate_of,
            created_at: row.created_at,
        })
    }
}

fn to_count(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("negative {column}: {value}"))
}

pub(crate) fn to_db_count(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| anyhow!("count out of range: {value}"))
}
