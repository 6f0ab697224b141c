//! In-process report store.
//!
//! Backs the offline CLI (JSON report dumps) and the test suites. Every
//! mutation runs under one write lock, so a merge is atomic for readers.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::MergeRejected;
use crate::traits::ReportStore;
use crate::types::Report;

#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reports(reports: impl IntoIterator<Item = Report>) -> Self {
        Self {
            reports: RwLock::new(reports.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Parse a JSON array of reports.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let reports: Vec<Report> = serde_json::from_str(json)?;
        Ok(Self::from_reports(reports))
    }

    /// Serialize every report, in `list_reports` order, as a JSON array.
    pub async fn to_json_string(&self) -> Result<String> {
        let reports = self.list_reports().await?;
        Ok(serde_json::to_string_pretty(&reports)?)
    }

    pub async fn insert(&self, report: Report) {
        self.reports.write().await.insert(report.id, report);
    }

    async fn update<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Report) + Send,
    {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(&id)
            .ok_or_else(|| anyhow!("report {id} not found"))?;
        f(report);
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.reports.read().await.get(&id).cloned())
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        let mut reports: Vec<Report> = self.reports.read().await.values().cloned().collect();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(reports)
    }

    async fn count_reports(&self) -> Result<u64> {
        Ok(self.reports.read().await.len() as u64)
    }

    async fn set_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        let embedding = embedding.to_vec();
        self.update(id, move |r| r.embedding = Some(embedding)).await
    }

    async fn set_severity(&self, id: Uuid, score: f64, at: DateTime<Utc>) -> Result<()> {
        self.update(id, move |r| {
            r.severity_score = score;
            r.severity_updated_at = Some(at);
        })
        .await
    }

    async fn set_category(&self, id: Uuid, category: &str, confidence: f32) -> Result<()> {
        let category = category.to_string();
        self.update(id, move |r| {
            r.category = Some(category);
            r.category_confidence = Some(confidence);
        })
        .await
    }

    async fn apply_merge(&self, duplicate_id: Uuid, original_id: Uuid) -> Result<u32> {
        let mut reports = self.reports.write().await;

        // Validate both rows before touching either.
        let transferred = reports
            .get(&duplicate_id)
            .map(|r| r.upvote_count)
            .ok_or_else(|| anyhow!("report {duplicate_id} not found"))?;
        let mut next = reports
            .get(&original_id)
            .ok_or_else(|| anyhow!("report {original_id} not found"))?
            .duplicate_of;

        // The caller's cycle check may be stale; repeat it under the lock.
        let mut steps = 0usize;
        while let Some(id) = next {
            if id == duplicate_id {
                return Err(MergeRejected(format!(
                    "merging {duplicate_id} into {original_id} would create a duplicate cycle"
                ))
                .into());
            }
            steps += 1;
            if steps > reports.len() {
                return Err(MergeRejected(format!(
                    "duplicate chain from {original_id} does not terminate"
                ))
                .into());
            }
            next = reports.get(&id).and_then(|r| r.duplicate_of);
        }

        let Some(original) = reports.get_mut(&original_id) else {
            return Err(anyhow!("report {original_id} not found"));
        };
        original.upvote_count = original.upvote_count.saturating_add(transferred);
        let total = original.upvote_count;

        if let Some(duplicate) = reports.get_mut(&duplicate_id) {
            duplicate.duplicate_of = Some(original_id);
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn lists_in_creation_order() {
        let now = Utc::now();
        let older = Report::new(Uuid::new_v4(), "older", "", now - Duration::days(2));
        let newer = Report::new(Uuid::new_v4(), "newer", "", now);
        let store = MemoryReportStore::from_reports([newer.clone(), older.clone()]);

        let listed = store.list_reports().await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[1].id, newer.id);
    }

    #[tokio::test]
    async fn merge_into_missing_original_leaves_duplicate_untouched() {
        let dup = Report::new(Uuid::new_v4(), "dup", "", Utc::now());
        let store = MemoryReportStore::from_reports([dup.clone()]);

        assert!(store.apply_merge(dup.id, Uuid::new_v4()).await.is_err());
        let stored = store.get_report(dup.id).await.unwrap().unwrap();
        assert_eq!(stored.duplicate_of, None);
    }

    #[tokio::test]
    async fn merge_back_into_own_duplicate_is_refused() {
        let mut a = Report::new(Uuid::new_v4(), "a", "", Utc::now());
        a.upvote_count = 2;
        let mut b = Report::new(Uuid::new_v4(), "b", "", Utc::now());
        b.upvote_count = 3;
        let store = MemoryReportStore::from_reports([a.clone(), b.clone()]);

        assert_eq!(store.apply_merge(b.id, a.id).await.unwrap(), 5);

        let err = store.apply_merge(a.id, b.id).await.unwrap_err();
        assert!(err.downcast_ref::<MergeRejected>().is_some());

        let stored_a = store.get_report(a.id).await.unwrap().unwrap();
        let stored_b = store.get_report(b.id).await.unwrap().unwrap();
        assert_eq!(stored_a.duplicate_of, None);
        assert_eq!(stored_a.upvote_count, 5);
        assert_eq!(stored_b.upvote_count, 3);
    }

    #[tokio::test]
    async fn parses_json_dump() {
        let json = r#"[{
            "id": "6f0b7c1e-7a43-4a43-9d0b-0a4f5f6b9a10",
            "title": "Broken streetlight",
            "status": "in_review",
            "upvote_count": 4,
            "created_at": "2026-01-05T10:00:00Z"
        }]"#;
        let store = MemoryReportStore::from_json_str(json).unwrap();
        assert_eq!(store.count_reports().await.unwrap(), 1);
        let report = &store.list_reports().await.unwrap()[0];
        assert_eq!(report.upvote_count, 4);
        assert_eq!(report.location, None);

        let reloaded = MemoryReportStore::from_json_str(&store.to_json_string().await.unwrap()).unwrap();
        assert_eq!(reloaded.list_reports().await.unwrap(), store.list_reports().await.unwrap());
    }
}
