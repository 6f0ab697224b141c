use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use wardsignal_common::{ReportStore, TriageError};

use crate::scoring::score_report;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub updated: u32,
    pub failed: u32,
    /// Terminal or duplicate reports whose score stays frozen.
    pub skipped: u32,
}

/// Re-score every live report as of `now` and persist the results.
///
/// Failing to list reports aborts the run. A failed write for one report is
/// logged and counted; the rest of the batch continues.
pub async fn recompute_all(
    store: &dyn ReportStore,
    now: DateTime<Utc>,
) -> Result<RecomputeSummary, TriageError> {
    let reports = store.list_reports().await?;
    let mut summary = RecomputeSummary::default();

    for report in &reports {
        if report.status.is_terminal() || report.is_duplicate() {
            summary.skipped += 1;
            continue;
        }

        let breakdown = score_report(report, now);
        match store
            .set_severity(report.id, breakdown.total_score, now)
            .await
        {
            Ok(()) => {
                debug!(
                    report_id = %report.id,
                    score = breakdown.total_score,
                    level = %breakdown.level,
                    "Severity updated"
                );
                summary.updated += 1;
            }
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "Failed to store severity");
                summary.failed += 1;
            }
        }
    }

    info!(
        updated = summary.updated,
        failed = summary.failed,
        skipped = summary.skipped,
        total = reports.len(),
        "Severity recompute complete"
    );
    Ok(summary)
}
