use serde::{Deserialize, Serialize};

/// Issue categories with a fixed base severity.
///
/// Labels come from free text (the image classifier or the reporting form).
/// Anything unrecognised, or a missing label, maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Security,
    Health,
    Water,
    Electricity,
    Roads,
    Sanitation,
    Environment,
    Transport,
    Education,
    Administrative,
    Other,
}

impl IssueCategory {
    /// Case-insensitive; ignores surrounding whitespace, `_`, `-` and spaces.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return IssueCategory::Other;
        };
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "security" => IssueCategory::Security,
            "health" => IssueCategory::Health,
            "water" => IssueCategory::Water,
            "electricity" => IssueCategory::Electricity,
            "roads" | "road" => IssueCategory::Roads,
            "sanitation" => IssueCategory::Sanitation,
            "environment" => IssueCategory::Environment,
            "transport" => IssueCategory::Transport,
            "education" => IssueCategory::Education,
            "administrative" => IssueCategory::Administrative,
            _ => IssueCategory::Other,
        }
    }

    /// Category component of the severity score, 0-100.
    pub fn base_score(self) -> f64 {
        match self {
            IssueCategory::Security => 100.0,
            IssueCategory::Health => 90.0,
            IssueCategory::Water => 85.0,
            IssueCategory::Electricity => 80.0,
            IssueCategory::Roads => 70.0,
            IssueCategory::Sanitation => 65.0,
            IssueCategory::Environment => 55.0,
            IssueCategory::Transport => 50.0,
            IssueCategory::Education => 45.0,
            IssueCategory::Administrative => 30.0,
            // Default branch for unknown labels.
            IssueCategory::Other => 30.0,
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueCategory::Security => "security",
            IssueCategory::Health => "health",
            IssueCategory::Water => "water",
            IssueCategory::Electricity => "electricity",
            IssueCategory::Roads => "roads",
            IssueCategory::Sanitation => "sanitation",
            IssueCategory::Environment => "environment",
            IssueCategory::Transport => "transport",
            IssueCategory::Education => "education",
            IssueCategory::Administrative => "administrative",
            IssueCategory::Other => "other",
        };
        f.write_str(label)
    }
}
