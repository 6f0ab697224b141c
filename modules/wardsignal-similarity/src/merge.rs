use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use wardsignal_common::{Report, TriageError};

use crate::index::SimilarityIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub duplicate_id: Uuid,
    pub original_id: Uuid,
    /// Upvotes on the original after the transfer.
    pub original_upvotes: u32,
}

impl SimilarityIndex {
    /// Mark `duplicate_id` as a restatement of `original_id` and move its
    /// upvotes onto the original.
    ///
    /// Self-merges and merges that would close a `duplicate_of` cycle are
    /// rejected before anything is written. The store repeats the cycle check
    /// inside the write that sets the flag and transfers upvotes, so opposing
    /// merges racing each other cannot both land.
    pub async fn mark_duplicate(
        &self,
        duplicate_id: Uuid,
        original_id: Uuid,
    ) -> Result<MergeOutcome, TriageError> {
        if duplicate_id == original_id {
            return Err(TriageError::InvariantViolation(format!(
                "report {duplicate_id} cannot be merged into itself"
            )));
        }

        let duplicate = self.load(duplicate_id).await?;
        let original = self.load(original_id).await?;
        self.ensure_acyclic(&duplicate, &original).await?;

        let original_upvotes = self
            .store
            .apply_merge(duplicate_id, original_id)
            .await
            .map_err(TriageError::from_merge_error)?;

        info!(
            %duplicate_id,
            %original_id,
            transferred = duplicate.upvote_count,
            original_upvotes,
            "Merged duplicate report"
        );

        Ok(MergeOutcome {
            duplicate_id,
            original_id,
            original_upvotes,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Report, TriageError> {
        self.store
            .get_report(id)
            .await?
            .ok_or_else(|| TriageError::report_not_found(id))
    }

    /// Walk `duplicate_of` links from the original. Reaching the duplicate
    /// means the merge would close a loop. The walk is bounded by the number
    /// of stored reports.
    async fn ensure_acyclic(&self, duplicate: &Report, original: &Report) -> Result<(), TriageError> {
        let bound = self.store.count_reports().await?;
        let mut next = original.duplicate_of;
        let mut steps = 0u64;

        while let Some(id) = next {
            if id == duplicate.id {
                return Err(TriageError::InvariantViolation(format!(
                    "merging {} into {} would create a duplicate cycle",
                    duplicate.id, original.id
                )));
            }
            steps += 1;
            if steps > bound {
                return Err(TriageError::InvariantViolation(format!(
                    "duplicate chain from {} does not terminate",
                    original.id
                )));
            }
            // A dangling link ends the chain.
            next = self
                .store
                .get_report(id)
                .await?
                .and_then(|r| r.duplicate_of);
        }
        Ok(())
    }
}
