//! Deterministic fakes for the provider and persistence seams.
//!
//! - FixedEmbedder (TextEmbedder): registered vectors, hash-based fallback
//! - FailingEmbedder (TextEmbedder): always errors, counts calls
//! - StaticRouter / FailingRouter (RouteProvider)
//! - StaticClassifier (ImageClassifier)
//! - FlakyStore (ReportStore): MemoryReportStore that fails writes for chosen ids

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::memory_store::MemoryReportStore;
use crate::traits::{ImageClassifier, ReportStore, RouteProvider, TextEmbedder};
use crate::types::{Classification, GeoPoint, Report, RouteResult};

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Text→vector map with a deterministic hash-based fallback.
pub struct FixedEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicU32,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            calls: AtomicU32::new(0),
        }
    }

    /// Register a text→vector mapping for controlled similarity.
    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        for v in vec.iter_mut() {
            // Simple LCG PRNG
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text)))
    }
}

/// Embedder whose provider is always down.
#[derive(Default)]
pub struct FailingEmbedder {
    calls: AtomicU32,
}

impl FailingEmbedder {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("embedding service returned 503"))
    }
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Returns the same route for every request, with a straight two-point geometry.
pub struct StaticRouter {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

#[async_trait]
impl RouteProvider for StaticRouter {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult> {
        Ok(RouteResult {
            distance_meters: self.distance_meters,
            duration_seconds: self.duration_seconds,
            geometry: vec![from, to],
        })
    }
}

#[derive(Default)]
pub struct FailingRouter {
    calls: AtomicU32,
}

impl FailingRouter {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for FailingRouter {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("routing service unreachable"))
    }
}

// ---------------------------------------------------------------------------
// StaticClassifier
// ---------------------------------------------------------------------------

pub struct StaticClassifier {
    pub classification: Classification,
}

#[async_trait]
impl ImageClassifier for StaticClassifier {
    async fn classify(&self, _image_url: &str) -> Result<Classification> {
        Ok(self.classification.clone())
    }
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

/// MemoryReportStore whose severity and embedding writes fail for chosen ids.
pub struct FlakyStore {
    inner: MemoryReportStore,
    failing: HashSet<Uuid>,
}

impl FlakyStore {
    pub fn new(inner: MemoryReportStore, failing: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            inner,
            failing: failing.into_iter().collect(),
        }
    }

    fn check(&self, id: Uuid) -> Result<()> {
        if self.failing.contains(&id) {
            return Err(anyhow!("simulated write failure for report {id}"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for FlakyStore {
    async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        self.inner.get_report(id).await
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        self.inner.list_reports().await
    }

    async fn count_reports(&self) -> Result<u64> {
        self.inner.count_reports().await
    }

    async fn set_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        self.check(id)?;
        self.inner.set_embedding(id, embedding).await
    }

    async fn set_severity(&self, id: Uuid, score: f64, at: DateTime<Utc>) -> Result<()> {
        self.check(id)?;
        self.inner.set_severity(id, score, at).await
    }

    async fn set_category(&self, id: Uuid, category: &str, confidence: f32) -> Result<()> {
        self.inner.set_category(id, category, confidence).await
    }

    async fn apply_merge(&self, duplicate_id: Uuid, original_id: Uuid) -> Result<u32> {
        self.inner.apply_merge(duplicate_id, original_id).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A fresh report at a coordinate.
pub fn report_at(title: &str, lat: f64, lng: f64, created_at: DateTime<Utc>) -> Report {
    let mut report = Report::new(Uuid::new_v4(), title, "", created_at);
    report.location = Some(GeoPoint { lat, lng });
    report
}

/// A fresh report carrying a stored embedding.
pub fn embedded_report(title: &str, embedding: Vec<f32>, created_at: DateTime<Utc>) -> Report {
    let mut report = Report::new(Uuid::new_v4(), title, "", created_at);
    report.embedding = Some(embedding);
    report
}
