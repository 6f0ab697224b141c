use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Classification, GeoPoint, Report, RouteResult};

// --- Provider seams ---

/// Embedding provider: text -> fixed-dimension vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Routing provider: path geometry, distance and duration between two points.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult>;
}

/// Image classifier used when re-analysis of a report photo is requested.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image_url: &str) -> Result<Classification>;
}

// --- Persistence seam ---

/// The slice of the report store the triage core reads and writes.
///
/// Implementations own transactions. `apply_merge` must write the duplicate
/// flag and the upvote transfer as one atomic unit.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get_report(&self, id: Uuid) -> Result<Option<Report>>;

    /// All reports, ordered by `created_at` then id.
    async fn list_reports(&self) -> Result<Vec<Report>>;

    /// Non-terminal, non-duplicate reports, ordered by `created_at` then id.
    async fn list_active_reports(&self) -> Result<Vec<Report>> {
        Ok(self
            .list_reports()
            .await?
            .into_iter()
            .filter(Report::is_active)
            .collect())
    }

    /// Reports still waiting for an embedding, oldest first.
    async fn list_unembedded(&self, limit: usize) -> Result<Vec<Report>> {
        Ok(self
            .list_reports()
            .await?
            .into_iter()
            .filter(|r| r.embedding.is_none())
            .take(limit)
            .collect())
    }

    async fn count_reports(&self) -> Result<u64>;

    async fn set_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;

    async fn set_severity(&self, id: Uuid, score: f64, at: DateTime<Utc>) -> Result<()>;

    async fn set_category(&self, id: Uuid, category: &str, confidence: f32) -> Result<()>;

    /// Set `duplicate.duplicate_of = original` and add the duplicate's upvotes
    /// onto the original, atomically. Returns the original's new upvote count.
    async fn apply_merge(&self, duplicate_id: Uuid, original_id: Uuid) -> Result<u32>;
}
