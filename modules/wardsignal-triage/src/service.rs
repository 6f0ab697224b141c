use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use wardsignal_common::{
    Classification, GeoPoint, ImageClassifier, Provider, Report, ReportStore, RetryPolicy,
    SeverityLevel, SimilarityCandidate, TriageError,
};
use wardsignal_geo::{BoundaryIndex, UnitStats};
use wardsignal_routing::{find_nearest_report, NearestReport, RouteEstimate, RoutingGateway};
use wardsignal_severity::{recompute_all, score_report, RecomputeSummary, SeverityBreakdown};
use wardsignal_similarity::{BackfillOutcome, BatchSummary, MergeOutcome, SimilarityIndex};

use crate::context::TriageContext;

/// Result of triaging one report.
#[derive(Debug, Clone, Serialize)]
pub struct TriageOutcome {
    pub report_id: Uuid,
    /// The embedding provider was unavailable; duplicate search was skipped
    /// and the report stays in the backfill queue.
    pub embedding_deferred: bool,
    pub similar: Vec<SimilarityCandidate>,
    pub severity: SeverityBreakdown,
    pub ward_id: Option<String>,
    pub district_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedReport {
    pub report_id: Uuid,
    pub title: String,
    pub severity_score: f64,
    pub level: SeverityLevel,
    pub ward_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReanalysisOutcome {
    pub classification: Classification,
    pub severity: SeverityBreakdown,
}

/// Entry point for the API and dashboard layers.
#[derive(Clone)]
pub struct TriageService {
    store: Arc<dyn ReportStore>,
    boundaries: Arc<BoundaryIndex>,
    similarity: SimilarityIndex,
    routing: RoutingGateway,
    classifier: Option<Arc<dyn ImageClassifier>>,
    retry: RetryPolicy,
    similarity_threshold: f64,
    similarity_limit: usize,
}

impl TriageService {
    pub fn new(ctx: TriageContext) -> Self {
        let similarity = SimilarityIndex::new(
            ctx.store.clone(),
            ctx.embedder,
            ctx.retry,
            ctx.embedding_dimension,
        );
        let routing = RoutingGateway::new(ctx.router, ctx.retry);

        Self {
            store: ctx.store,
            boundaries: ctx.boundaries,
            similarity,
            routing,
            classifier: ctx.classifier,
            retry: ctx.retry,
            similarity_threshold: ctx.similarity_threshold,
            similarity_limit: ctx.similarity_limit,
        }
    }

    pub fn boundaries(&self) -> &BoundaryIndex {
        &self.boundaries
    }

    async fn load(&self, id: Uuid) -> Result<Report, TriageError> {
        self.store
            .get_report(id)
            .await?
            .ok_or_else(|| TriageError::report_not_found(id))
    }

    /// Embed, deduplicate, score and locate a report.
    ///
    /// When the embedding provider is down the report is still scored and
    /// located; duplicate search is skipped and `embedding_deferred` is set.
    pub async fn triage_report(
        &self,
        report_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TriageOutcome, TriageError> {
        let mut report = self.load(report_id).await?;

        let embedding_deferred = match self.similarity.backfill_embedding(report_id).await {
            Ok(BackfillOutcome::Embedded) => {
                report = self.load(report_id).await?;
                false
            }
            Ok(BackfillOutcome::AlreadyEmbedded) => false,
            Err(e) if e.is_provider_unavailable() => {
                warn!(%report_id, error = %e, "Deferring duplicate check until embedding backfill");
                true
            }
            Err(e) => return Err(e),
        };

        let similar = if !embedding_deferred && report.is_active() {
            let candidates = self.store.list_reports().await?;
            self.similarity
                .find_similar(
                    &report,
                    &candidates,
                    self.similarity_threshold,
                    self.similarity_limit,
                )
                .await?
        } else {
            Vec::new()
        };

        let severity = score_report(&report, now);
        if report.is_active() {
            self.store
                .set_severity(report_id, severity.total_score, now)
                .await?;
        }

        let (ward_id, district_id) = match report.location {
            Some(point) => (
                self.boundaries.resolve_ward(point).map(|w| w.id.clone()),
                self.boundaries.resolve_district(point).map(|d| d.id.clone()),
            ),
            None => (None, None),
        };

        info!(
            %report_id,
            score = severity.total_score,
            level = %severity.level,
            similar = similar.len(),
            embedding_deferred,
            ward = ward_id.as_deref().unwrap_or("-"),
            "Report triaged"
        );

        Ok(TriageOutcome {
            report_id,
            embedding_deferred,
            similar,
            severity,
            ward_id,
            district_id,
        })
    }

    /// Active reports, most severe first. Ties go to the older report.
    pub async fn ranked_reports(&self, limit: usize) -> Result<Vec<RankedReport>, TriageError> {
        let mut reports = self.store.list_active_reports().await?;
        reports.sort_by(|a, b| {
            b.severity_score
                .total_cmp(&a.severity_score)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        reports.truncate(limit);

        Ok(reports
            .into_iter()
            .map(|r| RankedReport {
                report_id: r.id,
                level: wardsignal_severity::severity_level(r.severity_score),
                ward_id: r
                    .location
                    .and_then(|p| self.boundaries.resolve_ward(p))
                    .map(|w| w.id.clone()),
                severity_score: r.severity_score,
                created_at: r.created_at,
                title: r.title,
            })
            .collect())
    }

    /// Likely duplicates of a report. Resolved and rejected reports remain
    /// candidates; reports already merged away do not.
    pub async fn similar_reports(
        &self,
        report_id: Uuid,
    ) -> Result<Vec<SimilarityCandidate>, TriageError> {
        let report = self.load(report_id).await?;
        let candidates = self.store.list_reports().await?;
        self.similarity
            .find_similar(
                &report,
                &candidates,
                self.similarity_threshold,
                self.similarity_limit,
            )
            .await
    }

    /// Per-ward statistics over all non-duplicate reports.
    pub async fn ward_stats(&self) -> Result<BTreeMap<String, UnitStats>, TriageError> {
        let reports = self.canonical_reports().await?;
        Ok(self.boundaries.aggregate_stats(&reports))
    }

    pub async fn district_stats(&self) -> Result<BTreeMap<String, UnitStats>, TriageError> {
        let reports = self.canonical_reports().await?;
        Ok(self.boundaries.aggregate_district_stats(&reports))
    }

    /// Duplicates were folded into their originals on merge.
    async fn canonical_reports(&self) -> Result<Vec<Report>, TriageError> {
        Ok(self
            .store
            .list_reports()
            .await?
            .into_iter()
            .filter(|r| !r.is_duplicate())
            .collect())
    }

    pub async fn nearest_report(
        &self,
        origin: GeoPoint,
    ) -> Result<Option<NearestReport>, TriageError> {
        origin.validate()?;
        let candidates = self.store.list_active_reports().await?;
        Ok(find_nearest_report(origin, &candidates))
    }

    /// Travel route to a report, straight-line when routing is unavailable.
    pub async fn route_to_report(
        &self,
        origin: GeoPoint,
        report_id: Uuid,
    ) -> Result<RouteEstimate, TriageError> {
        let report = self.load(report_id).await?;
        let destination = report.location.ok_or_else(|| {
            TriageError::Validation(format!("report {report_id} has no coordinate"))
        })?;
        self.routing.route_or_straight_line(origin, destination).await
    }

    pub async fn merge_duplicate(
        &self,
        duplicate_id: Uuid,
        original_id: Uuid,
    ) -> Result<MergeOutcome, TriageError> {
        self.similarity.mark_duplicate(duplicate_id, original_id).await
    }

    pub async fn recompute_severity(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecomputeSummary, TriageError> {
        recompute_all(self.store.as_ref(), now).await
    }

    pub async fn backfill_embeddings(&self, limit: usize) -> Result<BatchSummary, TriageError> {
        self.similarity.backfill_missing(limit).await
    }

    /// Re-run the image classifier on a report photo, store the new category
    /// and re-score the report.
    pub async fn reanalyze_image(
        &self,
        report_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReanalysisOutcome, TriageError> {
        let report = self.load(report_id).await?;
        let image_url = report.image_url.as_deref().ok_or_else(|| {
            TriageError::Validation(format!("report {report_id} has no image"))
        })?;
        let classifier = self.classifier.as_ref().ok_or_else(|| {
            TriageError::provider(
                Provider::Classifier,
                anyhow::anyhow!("no image classifier configured"),
            )
        })?;

        let classification = self
            .retry
            .call("classify", move || classifier.classify(image_url))
            .await
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "Image classifier unavailable");
                TriageError::provider(Provider::Classifier, e)
            })?;

        self.store
            .set_category(report_id, &classification.category, classification.confidence)
            .await?;

        let mut updated = report.clone();
        updated.category = Some(classification.category.clone());
        updated.category_confidence = Some(classification.confidence);
        let severity = score_report(&updated, now);
        if updated.is_active() {
            self.store
                .set_severity(report_id, severity.total_score, now)
                .await?;
        }

        info!(
            %report_id,
            category = classification.category.as_str(),
            confidence = classification.confidence,
            hint = ?classification.severity_hint,
            score = severity.total_score,
            "Image re-analysed"
        );

        Ok(ReanalysisOutcome {
            classification,
            severity,
        })
    }
}
