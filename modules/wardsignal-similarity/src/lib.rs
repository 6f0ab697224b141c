pub mod cosine;
pub mod index;
pub mod merge;

pub use cosine::cosine_similarity;
pub use index::{BackfillOutcome, BatchSummary, SimilarityIndex};
pub use merge::MergeOutcome;
