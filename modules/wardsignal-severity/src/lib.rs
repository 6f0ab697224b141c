pub mod category;
pub mod recompute;
pub mod scoring;

pub use category::IssueCategory;
pub use recompute::{recompute_all, RecomputeSummary};
pub use scoring::{
    compute_severity, score_report, severity_level, status_multiplier, SeverityBreakdown,
    SeverityInputs,
};
