use anyhow::Result;
use async_trait::async_trait;

use crate::openai::StructuredOutput;

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Structured extraction from a single image.
#[async_trait]
pub trait VisionAgent: Send + Sync {
    async fn extract_from_image<T: StructuredOutput + Send>(
        &self,
        instructions: &str,
        image_url: &str,
    ) -> Result<T>;
}
