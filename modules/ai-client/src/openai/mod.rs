mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::traits::{EmbedAgent, VisionAgent};
use crate::util::{clip_to_bytes, unfence};
use client::OpenAiClient;

/// The embeddings endpoint rejects inputs over ~8k tokens.
const MAX_EMBED_INPUT_BYTES: usize = 30_000;

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }

    fn image_request<T: StructuredOutput>(
        &self,
        instructions: &str,
        image_url: &str,
    ) -> types::StructuredRequest {
        types::StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(instructions),
                types::WireMessage::user_with_image(
                    "Classify the issue shown in this photo.",
                    image_url,
                ),
            ],
            temperature: types::accepts_temperature(&self.model).then_some(0.0),
            response_format: types::ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: types::JsonSchemaFormat {
                    name: T::type_name(),
                    strict: true,
                    schema: T::openai_schema(),
                },
            },
        }
    }
}

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = clip_to_bytes(text, MAX_EMBED_INPUT_BYTES);
        self.client().embed(&self.embedding_model, input).await
    }
}

#[async_trait]
impl VisionAgent for OpenAi {
    async fn extract_from_image<T: StructuredOutput + Send>(
        &self,
        instructions: &str,
        image_url: &str,
    ) -> Result<T> {
        let request = self.image_request::<T>(instructions, image_url);
        let json_str = self.client().structured_output(&request).await?;
        debug!(model = %self.model, bytes = json_str.len(), "Vision response received");

        serde_json::from_str(unfence(&json_str))
            .map_err(|e| anyhow!("Failed to deserialize vision response: {}", e))
    }
}
