use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;
use wardsignal_common::{MergeRejected, Report, ReportStore};

use crate::row::{to_db_count, ReportRow, REPORT_COLUMNS};

/// Transaction-scoped advisory lock key held by every merge.
const MERGE_LOCK_KEY: i64 = 0x7761_7264_6d65_7267;

/// Postgres-backed report store.
///
/// The schema lives in `migrations/`. Only the fields the triage core owns
/// are ever updated here; report creation belongs to the intake service,
/// `insert_report` exists for seeding and tests.
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run report migrations")?;
        info!("Report migrations applied");
        Ok(())
    }

    pub async fn insert_report(&self, report: &Report) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reports
                (id, title, description, location_text, lat, lng, embedding,
                 category, category_confidence, image_url, severity_score,
                 severity_updated_at, upvote_count, verification_count, status,
                 duplicate_of, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(report.id)
        .bind(&report.title)
        .bind(&report.description)
        .bind(&report.location_text)
        .bind(report.location.map(|p| p.lat))
        .bind(report.location.map(|p| p.lng))
        .bind(&report.embedding)
        .bind(&report.category)
        .bind(report.category_confidence)
        .bind(&report.image_url)
        .bind(report.severity_score)
        .bind(report.severity_updated_at)
        .bind(to_db_count(report.upvote_count)?)
        .bind(to_db_count(report.verification_count)?)
        .bind(report.status.as_str())
        .bind(report.duplicate_of)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_reports(&self, sql: &str) -> Result<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Report::try_from).collect()
    }
}

fn ensure_updated(rows_affected: u64, id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        return Err(anyhow!("report {id} not found"));
    }
    Ok(())
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Report::try_from).transpose()
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        self.fetch_reports(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at, id"
        ))
        .await
    }

    async fn list_active_reports(&self) -> Result<Vec<Report>> {
        self.fetch_reports(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE duplicate_of IS NULL AND status NOT IN ('resolved', 'rejected')
             ORDER BY created_at, id"
        ))
        .await
    }

    async fn list_unembedded(&self, limit: usize) -> Result<Vec<Report>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE embedding IS NULL
             ORDER BY created_at, id
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Report::try_from).collect()
    }

    async fn count_reports(&self) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn set_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE reports SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(&self.pool)
            .await?;
        ensure_updated(result.rows_affected(), id)
    }

    async fn set_severity(&self, id: Uuid, score: f64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE reports SET severity_score = $2, severity_updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(score)
        .bind(at)
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), id)
    }

    async fn set_category(&self, id: Uuid, category: &str, confidence: f32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE reports SET category = $2, category_confidence = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(category)
        .bind(confidence)
        .execute(&self.pool)
        .await?;
        ensure_updated(result.rows_affected(), id)
    }

    async fn apply_merge(&self, duplicate_id: Uuid, original_id: Uuid) -> Result<u32> {
        let mut tx = self.pool.begin().await?;

        // Merges are serialised: two merges on disjoint rows can still close
        // a cycle through links neither of them locks.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MERGE_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        // Lock both rows in id order so concurrent merges cannot deadlock.
        let locked = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT id, upvote_count FROM reports
             WHERE id = ANY($1)
             ORDER BY id
             FOR UPDATE",
        )
        .bind(vec![duplicate_id, original_id])
        .fetch_all(&mut *tx)
        .await?;

        let upvotes_of = |id: Uuid| {
            locked
                .iter()
                .find(|(row_id, _)| *row_id == id)
                .map(|(_, upvotes)| *upvotes)
                .ok_or_else(|| anyhow!("report {id} not found"))
        };
        let transferred = upvotes_of(duplicate_id)?;
        upvotes_of(original_id)?;

        // Walk duplicate_of from the original, bounded by the row count.
        let (closes_cycle, unbounded) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            WITH RECURSIVE
                bound AS (SELECT COUNT(*) AS n FROM reports),
                chain(id, depth) AS (
                    SELECT duplicate_of, 1::bigint FROM reports
                    WHERE id = $1 AND duplicate_of IS NOT NULL
                    UNION ALL
                    SELECT r.duplicate_of, c.depth + 1
                    FROM chain c
                    JOIN reports r ON r.id = c.id
                    WHERE r.duplicate_of IS NOT NULL
                      AND c.id <> $2
                      AND c.depth <= (SELECT n FROM bound)
                )
            SELECT
                COALESCE(bool_or(id = $2), false),
                COALESCE(max(depth) > (SELECT n FROM bound), false)
            FROM chain
            "#,
        )
        .bind(original_id)
        .bind(duplicate_id)
        .fetch_one(&mut *tx)
        .await?;

        if closes_cycle {
            return Err(MergeRejected(format!(
                "merging {duplicate_id} into {original_id} would create a duplicate cycle"
            ))
            .into());
        }
        if unbounded {
            return Err(MergeRejected(format!(
                "duplicate chain from {original_id} does not terminate"
            ))
            .into());
        }

        let total = sqlx::query_scalar::<_, i32>(
            "UPDATE reports SET upvote_count = upvote_count + $2 WHERE id = $1
             RETURNING upvote_count",
        )
        .bind(original_id)
        .bind(transferred)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE reports SET duplicate_of = $2 WHERE id = $1")
            .bind(duplicate_id)
            .bind(original_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(%duplicate_id, %original_id, total, "Merge committed");

        u32::try_from(total).map_err(|_| anyhow!("negative upvote_count after merge: {total}"))
    }
}
