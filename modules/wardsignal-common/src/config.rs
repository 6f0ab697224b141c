use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Embedding + vision provider (OpenAI-compatible)
    pub openai_api_key: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub vision_model: String,

    // Routing provider (OSRM)
    pub osrm_url: String,
    pub osrm_profile: String,

    // Provider call limits
    pub provider_timeout_secs: u64,
    pub provider_max_attempts: u32,

    // Duplicate detection
    pub similarity_threshold: f64,
    pub similarity_limit: usize,

    // Static ward/district boundaries (GeoJSON)
    pub boundaries_path: Option<String>,
}

impl Config {
    /// Load the full configuration. Fails naming the first missing required var.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            openai_api_key: required_env("OPENAI_API_KEY")?,
            ..Self::offline_from_env()?
        })
    }

    /// Configuration for offline tooling that never talks to Postgres or the
    /// AI providers. Secrets are left empty.
    pub fn offline_from_env() -> Result<Self> {
        Ok(Self {
            database_url: String::new(),
            openai_api_key: String::new(),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", 1536)?,
            vision_model: env_or("VISION_MODEL", "gpt-4o-mini"),
            osrm_url: env_or("OSRM_URL", "https://router.project-osrm.org"),
            osrm_profile: env_or("OSRM_PROFILE", "driving"),
            provider_timeout_secs: parse_env("PROVIDER_TIMEOUT_SECS", 10)?,
            provider_max_attempts: parse_env("PROVIDER_MAX_ATTEMPTS", 3)?,
            similarity_threshold: parse_env("SIMILARITY_THRESHOLD", 0.85)?,
            similarity_limit: parse_env("SIMILARITY_LIMIT", 5)?,
            boundaries_path: env::var("BOUNDARIES_PATH").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Timeout and bounded retry applied to every provider call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.provider_timeout_secs),
            self.provider_max_attempts,
        )
    }

    /// Log the effective configuration with secrets redacted.
    pub fn log_redacted(&self) {
        info!(
            database = redact(&self.database_url),
            openai_api_key = redact(&self.openai_api_key),
            embedding_model = self.embedding_model.as_str(),
            embedding_dimension = self.embedding_dimension,
            vision_model = self.vision_model.as_str(),
            osrm_url = self.osrm_url.as_str(),
            osrm_profile = self.osrm_profile.as_str(),
            provider_timeout_secs = self.provider_timeout_secs,
            provider_max_attempts = self.provider_max_attempts,
            similarity_threshold = self.similarity_threshold,
            similarity_limit = self.similarity_limit,
            boundaries_path = self.boundaries_path.as_deref().unwrap_or("<none>"),
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        _ => Ok(default),
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
