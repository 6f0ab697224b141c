//! Production adapters behind the provider traits.

use std::sync::Arc;

use ai_client::{EmbedAgent, OpenAi, VisionAgent};
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use wardsignal_common::{
    Classification, Config, ImageClassifier, ReportStore, SeverityLevel, TextEmbedder,
};
use wardsignal_geo::BoundaryIndex;
use wardsignal_routing::OsrmRouter;

use crate::context::TriageContext;

const CLASSIFIER_INSTRUCTIONS: &str = "You triage photos attached to civic issue reports. \
Pick the single best category from: security, health, water, electricity, roads, sanitation, \
environment, transport, education, administrative, other. Give your confidence between 0 and 1, \
and a severity hint if the photo makes urgency obvious, otherwise null.";

/// Text embeddings through an OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: OpenAi,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = OpenAi::new(api_key, model).with_embedding_model(model);
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
enum SeverityHint {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityHint> for SeverityLevel {
    fn from(hint: SeverityHint) -> Self {
        match hint {
            SeverityHint::Low => SeverityLevel::Low,
            SeverityHint::Medium => SeverityLevel::Medium,
            SeverityHint::High => SeverityLevel::High,
            SeverityHint::Critical => SeverityLevel::Critical,
        }
    }
}

/// Structured response requested from the vision model.
#[derive(Debug, Deserialize, JsonSchema)]
struct ImageLabel {
    category: String,
    confidence: f32,
    severity_hint: Option<SeverityHint>,
}

impl From<ImageLabel> for Classification {
    fn from(label: ImageLabel) -> Self {
        Classification {
            category: label.category.trim().to_lowercase(),
            confidence: if label.confidence.is_finite() {
                label.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            severity_hint: label.severity_hint.map(Into::into),
        }
    }
}

/// Photo classification through an OpenAI vision model.
pub struct OpenAiClassifier {
    client: OpenAi,
}

impl OpenAiClassifier {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: OpenAi::new(api_key, model),
        }
    }
}

#[async_trait]
impl ImageClassifier for OpenAiClassifier {
    async fn classify(&self, image_url: &str) -> Result<Classification> {
        let label: ImageLabel = self
            .client
            .extract_from_image(CLASSIFIER_INSTRUCTIONS, image_url)
            .await?;
        Ok(label.into())
    }
}

/// Wire the production providers from configuration.
pub fn live_context(
    config: &Config,
    store: Arc<dyn ReportStore>,
    boundaries: Arc<BoundaryIndex>,
) -> TriageContext {
    let classifier: Arc<dyn ImageClassifier> = Arc::new(OpenAiClassifier::new(
        &config.openai_api_key,
        &config.vision_model,
    ));

    TriageContext::builder()
        .store(store)
        .embedder(Arc::new(OpenAiEmbedder::new(
            &config.openai_api_key,
            &config.embedding_model,
        )))
        .router(Arc::new(OsrmRouter::new(&config.osrm_url, &config.osrm_profile)))
        .classifier(Some(classifier))
        .boundaries(boundaries)
        .retry(config.retry_policy())
        .embedding_dimension(config.embedding_dimension)
        .similarity_threshold(config.similarity_threshold)
        .similarity_limit(config.similarity_limit)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_normalised() {
        let label: ImageLabel = serde_json::from_str(
            r#"{"category": " Roads ", "confidence": 1.4, "severity_hint": "high"}"#,
        )
        .unwrap();
        let c = Classification::from(label);
        assert_eq!(c.category, "roads");
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.severity_hint, Some(SeverityLevel::High));
    }

    #[test]
    fn null_hint_is_none() {
        let label: ImageLabel =
            serde_json::from_str(r#"{"category": "water", "confidence": 0.6, "severity_hint": null}"#)
                .unwrap();
        assert_eq!(Classification::from(label).severity_hint, None);
    }
}
