use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wardsignal_common::{
    Provider, Report, ReportStore, RetryPolicy, SimilarityCandidate, TextEmbedder, TriageError,
};

use crate::cosine::cosine_similarity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillOutcome {
    Embedded,
    AlreadyEmbedded,
}

/// Completion summary for a batch job. Per-item failures never abort the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub updated: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Duplicate detection over stored report embeddings.
///
/// Owns the embedding provider seam: every provider call goes through the
/// retry policy and its output is checked against the configured dimension.
#[derive(Clone)]
pub struct SimilarityIndex {
    pub(crate) store: Arc<dyn ReportStore>,
    embedder: Arc<dyn TextEmbedder>,
    retry: RetryPolicy,
    dimension: usize,
}

impl SimilarityIndex {
    pub fn new(
        store: Arc<dyn ReportStore>,
        embedder: Arc<dyn TextEmbedder>,
        retry: RetryPolicy,
        dimension: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            retry,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed free text through the provider.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, TriageError> {
        let embedder = &self.embedder;
        let embedding = self
            .retry
            .call("embed", move || embedder.embed(text))
            .await
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "Embedding provider unavailable");
                TriageError::provider(Provider::Embedding, e)
            })?;

        if embedding.len() != self.dimension {
            return Err(TriageError::Validation(format!(
                "embedding provider returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }

    /// Rank `candidates` by similarity to `report`.
    ///
    /// Uses the report's stored embedding, or requests one when it has none.
    /// Skips the report itself, duplicates, and candidates without an
    /// embedding. Keeps scores at or above `threshold`, highest first, ties
    /// going to the earlier report, at most `limit` results.
    pub async fn find_similar(
        &self,
        report: &Report,
        candidates: &[Report],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, TriageError> {
        let requested;
        let query: &[f32] = match report.embedding.as_deref() {
            Some(embedding) => embedding,
            None => {
                requested = self.embed_text(&report.embedding_text()).await?;
                &requested
            }
        };

        let mut unembedded = 0usize;
        let mut scored: Vec<(f64, &Report)> = Vec::new();
        for candidate in candidates {
            if candidate.id == report.id || candidate.is_duplicate() {
                continue;
            }
            let Some(embedding) = candidate.embedding.as_deref() else {
                unembedded += 1;
                continue;
            };
            let similarity = cosine_similarity(query, embedding)?;
            if similarity >= threshold {
                scored.push((similarity, candidate));
            }
        }

        if unembedded > 0 {
            debug!(
                report_id = %report.id,
                unembedded,
                "Skipped candidates without embeddings"
            );
        }

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(similarity, candidate)| SimilarityCandidate {
                report_id: candidate.id,
                similarity,
            })
            .collect())
    }

    /// Compute and store a report's embedding. A report that already has one
    /// is left alone.
    pub async fn backfill_embedding(&self, report_id: Uuid) -> Result<BackfillOutcome, TriageError> {
        let report = self
            .store
            .get_report(report_id)
            .await?
            .ok_or_else(|| TriageError::report_not_found(report_id))?;

        if report.embedding.is_some() {
            return Ok(BackfillOutcome::AlreadyEmbedded);
        }

        let embedding = self.embed_text(&report.embedding_text()).await?;
        self.store.set_embedding(report_id, &embedding).await?;
        debug!(%report_id, "Stored report embedding");
        Ok(BackfillOutcome::Embedded)
    }

    /// Backfill up to `limit` reports that are missing embeddings.
    pub async fn backfill_missing(&self, limit: usize) -> Result<BatchSummary, TriageError> {
        let pending = self.store.list_unembedded(limit).await?;
        let mut summary = BatchSummary::default();

        for report in &pending {
            match self.backfill_embedding(report.id).await {
                Ok(BackfillOutcome::Embedded) => summary.updated += 1,
                Ok(BackfillOutcome::AlreadyEmbedded) => summary.skipped += 1,
                Err(e) => {
                    warn!(report_id = %report.id, error = %e, "Embedding backfill failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            updated = summary.updated,
            failed = summary.failed,
            skipped = summary.skipped,
            "Embedding backfill complete"
        );
        Ok(summary)
    }
}
