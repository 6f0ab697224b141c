pub mod context;
pub mod providers;
pub mod service;

pub use context::TriageContext;
pub use providers::{live_context, OpenAiClassifier, OpenAiEmbedder};
pub use service::{RankedReport, ReanalysisOutcome, TriageOutcome, TriageService};
