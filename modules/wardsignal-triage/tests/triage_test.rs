use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;
use wardsignal_common::testing::{
    embedded_report, report_at, FailingEmbedder, FailingRouter, FixedEmbedder, StaticClassifier,
};
use wardsignal_common::{
    AdminLevel, AdminUnit, Classification, GeoPoint, ImageClassifier, MemoryReportStore, Polygon,
    Provider, Report, ReportStatus, ReportStore, RetryPolicy, RouteProvider, SeverityLevel,
    TextEmbedder, TriageError,
};
use wardsignal_geo::BoundaryIndex;
use wardsignal_routing::RouteSource;
use wardsignal_triage::{TriageContext, TriageService};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 20, 10, 0, 0).unwrap()
}

fn square(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Polygon {
    Polygon::from_ring(vec![
        GeoPoint { lat: min_lat, lng: min_lng },
        GeoPoint { lat: min_lat, lng: max_lng },
        GeoPoint { lat: max_lat, lng: max_lng },
        GeoPoint { lat: max_lat, lng: min_lng },
    ])
}

fn boundaries() -> Arc<BoundaryIndex> {
    let units = vec![
        AdminUnit {
            id: "D1".into(),
            name: "Central".into(),
            level: AdminLevel::District,
            parent_id: None,
            polygon: square(0.0, 0.0, 10.0, 20.0),
        },
        AdminUnit {
            id: "W1".into(),
            name: "Riverside".into(),
            level: AdminLevel::Ward,
            parent_id: Some("D1".into()),
            polygon: square(0.0, 0.0, 10.0, 10.0),
        },
        AdminUnit {
            id: "W2".into(),
            name: "Hillcrest".into(),
            level: AdminLevel::Ward,
            parent_id: Some("D1".into()),
            polygon: square(0.0, 10.0, 10.0, 20.0),
        },
    ];
    Arc::new(BoundaryIndex::new(units).unwrap())
}

struct Harness {
    store: Arc<MemoryReportStore>,
    embedder: Arc<dyn TextEmbedder>,
    router: Arc<dyn RouteProvider>,
    classifier: Option<Arc<dyn ImageClassifier>>,
}

impl Harness {
    fn new(reports: Vec<Report>) -> Self {
        Self {
            store: Arc::new(MemoryReportStore::from_reports(reports)),
            embedder: Arc::new(FixedEmbedder::new(2)),
            router: Arc::new(FailingRouter::default()),
            classifier: None,
        }
    }

    fn embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = embedder;
        self
    }

    fn classifier(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn service(&self) -> TriageService {
        TriageService::new(
            TriageContext::builder()
                .store(self.store.clone())
                .embedder(self.embedder.clone())
                .router(self.router.clone())
                .classifier(self.classifier.clone())
                .boundaries(boundaries())
                .retry(
                    RetryPolicy::new(StdDuration::from_millis(50), 2)
                        .with_base_backoff(StdDuration::ZERO),
                )
                .embedding_dimension(2)
                .build(),
        )
    }

    async fn get(&self, id: Uuid) -> Report {
        self.store.get_report(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn triage_embeds_scores_and_locates() {
    let mut existing = embedded_report("Pothole Main St", vec![0.99, 0.1], now() - Duration::days(2));
    existing.location = Some(GeoPoint { lat: 5.0, lng: 5.1 });
    let unrelated = embedded_report("Loud music", vec![0.0, 1.0], now() - Duration::days(1));
    let new_report = report_at("Pothole on Main", 5.0, 5.0, now());

    let h = Harness::new(vec![existing.clone(), unrelated, new_report.clone()])
        .embedder(Arc::new(FixedEmbedder::new(2).on_text("Pothole on Main", vec![1.0, 0.0])));
    let outcome = h.service().triage_report(new_report.id, now()).await.unwrap();

    assert!(!outcome.embedding_deferred);
    assert_eq!(outcome.similar.len(), 1);
    assert_eq!(outcome.similar[0].report_id, existing.id);
    assert_eq!(outcome.ward_id.as_deref(), Some("W1"));
    assert_eq!(outcome.district_id.as_deref(), Some("D1"));
    assert_eq!(outcome.severity.total_score, 7.5);

    let stored = h.get(new_report.id).await;
    assert_eq!(stored.embedding, Some(vec![1.0, 0.0]));
    assert_eq!(stored.severity_score, 7.5);
    assert_eq!(stored.severity_updated_at, Some(now()));
}

#[tokio::test]
async fn embedding_outage_defers_duplicate_check() {
    let mut report = report_at("Broken hydrant", 5.0, 15.0, now() - Duration::days(3));
    report.category = Some("water".into());

    let h = Harness::new(vec![report.clone()]).embedder(Arc::new(FailingEmbedder::default()));
    let outcome = h.service().triage_report(report.id, now()).await.unwrap();

    assert!(outcome.embedding_deferred);
    assert!(outcome.similar.is_empty());
    assert_eq!(outcome.ward_id.as_deref(), Some("W2"));
    assert_eq!(outcome.severity.level, SeverityLevel::Low);

    let stored = h.get(report.id).await;
    assert!(stored.embedding.is_none());
    assert_eq!(stored.severity_score, outcome.severity.total_score);
}

#[tokio::test]
async fn triage_of_missing_report_is_not_found() {
    let h = Harness::new(vec![]);
    let err = h.service().triage_report(Uuid::new_v4(), now()).await.unwrap_err();
    assert!(matches!(err, TriageError::NotFound { .. }));
}

#[tokio::test]
async fn ranking_orders_active_reports_by_severity() {
    let mut low = report_at("Low", 1.0, 1.0, now() - Duration::days(1));
    low.severity_score = 10.0;
    let mut high_old = report_at("High old", 1.0, 11.0, now() - Duration::days(5));
    high_old.severity_score = 60.0;
    let mut high_new = report_at("High new", 1.0, 2.0, now() - Duration::days(2));
    high_new.severity_score = 60.0;
    let mut resolved = report_at("Resolved", 1.0, 3.0, now() - Duration::days(9));
    resolved.severity_score = 99.0;
    resolved.status = ReportStatus::Resolved;
    let mut dup = report_at("Dup", 1.0, 4.0, now());
    dup.severity_score = 80.0;
    dup.duplicate_of = Some(low.id);

    let h = Harness::new(vec![
        low.clone(),
        high_old.clone(),
        high_new.clone(),
        resolved,
        dup,
    ]);
    let ranked = h.service().ranked_reports(10).await.unwrap();

    let ids: Vec<_> = ranked.iter().map(|r| r.report_id).collect();
    assert_eq!(ids, vec![high_old.id, high_new.id, low.id]);
    assert_eq!(ranked[0].level, SeverityLevel::High);
    assert_eq!(ranked[0].ward_id.as_deref(), Some("W2"));
    assert_eq!(ranked[2].level, SeverityLevel::Low);

    assert_eq!(h.service().ranked_reports(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ward_stats_average_contained_reports() {
    let mut a = report_at("A", 2.0, 2.0, now());
    a.severity_score = 40.0;
    a.upvote_count = 3;
    let mut b = report_at("B", 8.0, 8.0, now());
    b.severity_score = 60.0;
    b.upvote_count = 1;
    let mut outside = report_at("Outside", 50.0, 50.0, now());
    outside.severity_score = 90.0;
    let mut folded = report_at("Folded", 3.0, 3.0, now());
    folded.severity_score = 70.0;
    folded.duplicate_of = Some(a.id);
    let no_location = Report::new(Uuid::new_v4(), "Nowhere", "", now());

    let h = Harness::new(vec![a, b, outside, folded, no_location]);
    let service = h.service();

    let wards = service.ward_stats().await.unwrap();
    let w1 = wards["W1"];
    assert_eq!(w1.count, 2);
    assert_eq!(w1.total_upvotes, 4);
    assert_eq!(w1.avg_severity, 50.0);
    assert_eq!(wards["W2"].count, 0);
    assert_eq!(wards["W2"].avg_severity, 0.0);

    let districts = service.district_stats().await.unwrap();
    assert_eq!(districts["D1"].count, 2);
}

#[tokio::test]
async fn nearest_and_route_with_routing_down() {
    let near = report_at("Near", 5.0, 5.0, now());
    let far = report_at("Far", 9.0, 19.0, now());
    let unlocated = Report::new(Uuid::new_v4(), "Unlocated", "", now());

    let h = Harness::new(vec![near.clone(), far.clone(), unlocated.clone()]);
    let service = h.service();
    let origin = GeoPoint { lat: 5.0, lng: 6.0 };

    let nearest = service.nearest_report(origin).await.unwrap().unwrap();
    assert_eq!(nearest.report_id, near.id);

    let estimate = service.route_to_report(origin, far.id).await.unwrap();
    assert_eq!(estimate.source, RouteSource::StraightLine);
    assert!(estimate.duration_seconds.is_none());

    let err = service.route_to_report(origin, unlocated.id).await.unwrap_err();
    assert!(matches!(err, TriageError::Validation(_)));

    let err = service
        .nearest_report(GeoPoint { lat: 0.0, lng: 200.0 })
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::Validation(_)));
}

#[tokio::test]
async fn merged_duplicates_leave_ranking_and_search() {
    let mut a = embedded_report("Streetlight out", vec![1.0, 0.0], now() - Duration::days(1));
    a.upvote_count = 5;
    let mut b = embedded_report("Streetlight dark", vec![1.0, 0.0], now());
    b.upvote_count = 3;

    let h = Harness::new(vec![a.clone(), b.clone()]);
    let service = h.service();

    assert_eq!(service.similar_reports(a.id).await.unwrap().len(), 1);

    let merged = service.merge_duplicate(b.id, a.id).await.unwrap();
    assert_eq!(merged.original_upvotes, 8);

    assert!(service.similar_reports(a.id).await.unwrap().is_empty());
    let ranked = service.ranked_reports(10).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].report_id, a.id);

    let err = service.merge_duplicate(a.id, b.id).await.unwrap_err();
    assert!(matches!(err, TriageError::InvariantViolation(_)));
}

#[tokio::test]
async fn resolved_reports_remain_duplicate_candidates() {
    let query = embedded_report("Burst water main", vec![1.0, 0.0], now());
    let mut resolved = embedded_report("Burst water main", vec![1.0, 0.0], now() - Duration::days(9));
    resolved.status = ReportStatus::Resolved;
    let mut rejected = embedded_report("Burst water main", vec![1.0, 0.0], now() - Duration::days(8));
    rejected.status = ReportStatus::Rejected;

    let h = Harness::new(vec![query.clone(), resolved.clone(), rejected.clone()]);
    let service = h.service();

    let similar = service.similar_reports(query.id).await.unwrap();
    let ids: Vec<_> = similar.iter().map(|c| c.report_id).collect();
    assert_eq!(ids, vec![resolved.id, rejected.id]);

    let outcome = service.triage_report(query.id, now()).await.unwrap();
    assert_eq!(outcome.similar.len(), 2);
    assert_eq!(outcome.similar[0].report_id, resolved.id);
}

#[tokio::test]
async fn recompute_and_backfill_through_the_service() {
    let pending = report_at("Needs embedding", 1.0, 1.0, now() - Duration::days(6));
    let mut closed = report_at("Closed", 1.0, 1.0, now() - Duration::days(60));
    closed.status = ReportStatus::Rejected;

    let h = Harness::new(vec![pending.clone(), closed]);
    let service = h.service();

    let summary = service.recompute_severity(now()).await.unwrap();
    assert_eq!((summary.updated, summary.skipped, summary.failed), (1, 1, 0));

    let batch = service.backfill_embeddings(10).await.unwrap();
    assert_eq!(batch.updated, 2);
    assert!(h.get(pending.id).await.embedding.is_some());
}

#[tokio::test]
async fn reanalysis_updates_category_and_score() {
    let mut report = report_at("Exposed wiring", 5.0, 5.0, now());
    report.image_url = Some("https://img.example/wires.jpg".into());

    let classifier = Arc::new(StaticClassifier {
        classification: Classification {
            category: "security".into(),
            confidence: 0.92,
            severity_hint: Some(SeverityLevel::High),
        },
    });
    let h = Harness::new(vec![report.clone()]).classifier(classifier);
    let outcome = h.service().reanalyze_image(report.id, now()).await.unwrap();

    assert_eq!(outcome.severity.category_score, 100.0);
    assert_eq!(outcome.severity.total_score, 25.0);

    let stored = h.get(report.id).await;
    assert_eq!(stored.category.as_deref(), Some("security"));
    assert_eq!(stored.category_confidence, Some(0.92));
    assert_eq!(stored.severity_score, 25.0);
}

#[tokio::test]
async fn reanalysis_requires_image_and_classifier() {
    let mut with_image = report_at("Photo", 5.0, 5.0, now());
    with_image.image_url = Some("https://img.example/1.jpg".into());
    let without_image = report_at("No photo", 5.0, 5.0, now());

    let h = Harness::new(vec![with_image.clone(), without_image.clone()]);
    let service = h.service();

    let err = service.reanalyze_image(without_image.id, now()).await.unwrap_err();
    assert!(matches!(err, TriageError::Validation(_)));

    let err = service.reanalyze_image(with_image.id, now()).await.unwrap_err();
    assert!(matches!(
        err,
        TriageError::ProviderUnavailable {
            provider: Provider::Classifier,
            ..
        }
    ));
}
