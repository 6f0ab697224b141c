use std::sync::Arc;

use typed_builder::TypedBuilder;
use wardsignal_common::{ImageClassifier, ReportStore, RetryPolicy, RouteProvider, TextEmbedder};
use wardsignal_geo::BoundaryIndex;

/// Long-lived collaborators shared by every triage operation.
///
/// The boundary index is built once at startup and only read afterwards.
#[derive(Clone, TypedBuilder)]
pub struct TriageContext {
    pub store: Arc<dyn ReportStore>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub router: Arc<dyn RouteProvider>,
    #[builder(default)]
    pub classifier: Option<Arc<dyn ImageClassifier>>,
    pub boundaries: Arc<BoundaryIndex>,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default = 1536)]
    pub embedding_dimension: usize,
    #[builder(default = 0.85)]
    pub similarity_threshold: f64,
    #[builder(default = 5)]
    pub similarity_limit: usize,
}
