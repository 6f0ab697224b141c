use thiserror::Error;

/// External collaborator a provider failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Embedding,
    Routing,
    Classifier,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Embedding => write!(f, "embedding"),
            Provider::Routing => write!(f, "routing"),
            Provider::Classifier => write!(f, "classifier"),
        }
    }
}

/// Raised by a store when a merge fails its cycle check inside the write
/// transaction. Callers see it as `TriageError::InvariantViolation`.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct MergeRejected(pub String);

#[derive(Error, Debug)]
pub enum TriageError {
    /// Malformed input: bad coordinate, dimension mismatch, invalid merge target.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{provider} provider unavailable: {message}")]
    ProviderUnavailable { provider: Provider, message: String },

    /// Rejected before any write (self-merge, duplicate cycle).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl TriageError {
    pub fn report_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "report",
            id: id.to_string(),
        }
    }

    pub fn unit_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "administrative unit",
            id: id.to_string(),
        }
    }

    pub fn provider(provider: Provider, err: anyhow::Error) -> Self {
        Self::ProviderUnavailable {
            provider,
            message: format!("{err:#}"),
        }
    }

    /// Store failure, unless the store refused a merge as a cycle.
    pub fn from_merge_error(err: anyhow::Error) -> Self {
        match err.downcast::<MergeRejected>() {
            Ok(rejected) => Self::InvariantViolation(rejected.0),
            Err(err) => Self::Storage(err),
        }
    }

    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }
}
