//! Composite severity score.
//!
//! ```text
//! upvote       = min(100, log10(upvotes + 1) * 50)
//! time         = min(100, age_days / 30 * 100)
//! category     = fixed table, unknown -> 30
//! verification = min(100, log10(verifications + 1) * 60)
//! raw          = 0.4 upvote + 0.2 time + 0.25 category + 0.15 verification
//! total        = round2(raw * status_multiplier)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use wardsignal_common::{Report, ReportStatus, SeverityLevel};

use crate::category::IssueCategory;

const UPVOTE_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.2;
const CATEGORY_WEIGHT: f64 = 0.25;
const VERIFICATION_WEIGHT: f64 = 0.15;

/// Age at which the time component saturates.
const TIME_RAMP_DAYS: f64 = 30.0;

const CRITICAL_THRESHOLD: f64 = 75.0;
const HIGH_THRESHOLD: f64 = 50.0;
const MEDIUM_THRESHOLD: f64 = 25.0;

/// Snapshot of everything the score depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityInputs {
    pub upvotes: u32,
    pub verifications: u32,
    pub age_days: f64,
    pub category: IssueCategory,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityBreakdown {
    pub upvote_score: f64,
    pub time_score: f64,
    pub category_score: f64,
    pub verification_score: f64,
    pub raw_score: f64,
    pub status_multiplier: f64,
    pub total_score: f64,
    pub level: SeverityLevel,
}

pub fn status_multiplier(status: ReportStatus) -> f64 {
    match status {
        ReportStatus::Reported => 1.0,
        ReportStatus::InReview => 0.9,
        ReportStatus::InProgress => 0.7,
        ReportStatus::Resolved => 0.1,
        ReportStatus::Rejected => 0.0,
    }
}

/// Band for a total score. Boundary values belong to the higher band.
pub fn severity_level(score: f64) -> SeverityLevel {
    if score >= CRITICAL_THRESHOLD {
        SeverityLevel::Critical
    } else if score >= HIGH_THRESHOLD {
        SeverityLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        SeverityLevel::Medium
    } else {
        // NaN lands here too.
        SeverityLevel::Low
    }
}

pub fn compute_severity(inputs: SeverityInputs) -> SeverityBreakdown {
    let upvote_score = log_component(inputs.upvotes, 50.0);
    let verification_score = log_component(inputs.verifications, 60.0);
    let time_score = (inputs.age_days.max(0.0) / TIME_RAMP_DAYS * 100.0).min(100.0);
    let category_score = inputs.category.base_score();

    let raw_score = UPVOTE_WEIGHT * upvote_score
        + TIME_WEIGHT * time_score
        + CATEGORY_WEIGHT * category_score
        + VERIFICATION_WEIGHT * verification_score;

    let multiplier = status_multiplier(inputs.status);
    let total_score = round2(raw_score * multiplier);

    SeverityBreakdown {
        upvote_score,
        time_score,
        category_score,
        verification_score,
        raw_score,
        status_multiplier: multiplier,
        total_score,
        level: severity_level(total_score),
    }
}

/// Score a report as of `now`. Future `created_at` counts as age 0.
pub fn score_report(report: &Report, now: DateTime<Utc>) -> SeverityBreakdown {
    compute_severity(SeverityInputs {
        upvotes: report.upvote_count,
        verifications: report.verification_count,
        age_days: age_days(report.created_at, now),
        category: IssueCategory::from_label(report.category.as_deref()),
        status: report.status,
    })
}

fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds().max(0);
    millis as f64 / 86_400_000.0
}

fn log_component(count: u32, scale: f64) -> f64 {
    ((f64::from(count) + 1.0).log10() * scale).min(100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> SeverityInputs {
        SeverityInputs {
            upvotes: 0,
            verifications: 0,
            age_days: 0.0,
            category: IssueCategory::Security,
            status: ReportStatus::Reported,
        }
    }

    #[test]
    fn fresh_security_report_is_medium() {
        let b = compute_severity(inputs());
        assert_eq!(b.category_score, 100.0);
        assert_eq!(b.upvote_score, 0.0);
        assert_eq!(b.time_score, 0.0);
        assert_eq!(b.raw_score, 25.0);
        assert_eq!(b.total_score, 25.0);
        assert_eq!(b.level, SeverityLevel::Medium);
    }

    #[test]
    fn level_boundaries_belong_to_higher_band() {
        assert_eq!(severity_level(75.0), SeverityLevel::Critical);
        assert_eq!(severity_level(74.99), SeverityLevel::High);
        assert_eq!(severity_level(50.0), SeverityLevel::High);
        assert_eq!(severity_level(49.99), SeverityLevel::Medium);
        assert_eq!(severity_level(25.0), SeverityLevel::Medium);
        assert_eq!(severity_level(24.99), SeverityLevel::Low);
        assert_eq!(severity_level(f64::NAN), SeverityLevel::Low);
    }

    #[test]
    fn components_saturate_at_100() {
        let b = compute_severity(SeverityInputs {
            upvotes: 1_000_000,
            verifications: 1_000_000,
            age_days: 400.0,
            ..inputs()
        });
        assert_eq!(b.upvote_score, 100.0);
        assert_eq!(b.verification_score, 100.0);
        assert_eq!(b.time_score, 100.0);
        assert_eq!(b.total_score, 100.0);
        assert_eq!(b.level, SeverityLevel::Critical);
    }

    #[test]
    fn time_ramp_is_linear_over_thirty_days() {
        let b = compute_severity(SeverityInputs {
            age_days: 15.0,
            ..inputs()
        });
        assert_eq!(b.time_score, 50.0);
    }

    #[test]
    fn nine_upvotes_score_fifty() {
        let b = compute_severity(SeverityInputs {
            upvotes: 9,
            ..inputs()
        });
        assert!((b.upvote_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn status_scales_the_total() {
        let rejected = compute_severity(SeverityInputs {
            status: ReportStatus::Rejected,
            ..inputs()
        });
        assert_eq!(rejected.total_score, 0.0);

        let in_progress = compute_severity(SeverityInputs {
            status: ReportStatus::InProgress,
            ..inputs()
        });
        assert_eq!(in_progress.total_score, 17.5);
        assert_eq!(in_progress.level, SeverityLevel::Low);
    }

    #[test]
    fn total_is_rounded_to_two_decimals() {
        let b = compute_severity(SeverityInputs {
            upvotes: 2,
            category: IssueCategory::Roads,
            status: ReportStatus::InReview,
            ..inputs()
        });
        assert_eq!(b.total_score, round2(b.raw_score * 0.9));
        assert!((b.total_score - b.raw_score * 0.9).abs() <= 0.005);
    }

    #[test]
    fn negative_age_clamps_to_zero() {
        let b = compute_severity(SeverityInputs {
            age_days: -3.0,
            ..inputs()
        });
        assert_eq!(b.time_score, 0.0);
    }
}
