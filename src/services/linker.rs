//! Duplicate-graph repair planning for deletions.

use crate::models::FileRecord;
use crate::storage::traits::RepairPlan;
use tracing::debug;

/// Plans the graph repair required when a record is deleted.
///
/// Deleting a duplicate needs no repair. Deleting an original that still has
/// linked duplicates must not orphan them: the newest duplicate is promoted
/// to original and the remaining duplicates are re-pointed at it, keeping the
/// link graph at depth 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipLinker;

impl OwnershipLinker {
    /// Creates a linker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the repair plan for deleting `record`, or `None` when the
    /// deletion is safe as-is.
    ///
    /// `duplicates` must be the records currently linked to `record`, newest
    /// first, as returned by the record store.
    #[must_use]
    pub fn plan_repair(self, record: &FileRecord, duplicates: &[FileRecord]) -> Option<RepairPlan> {
        if !record.is_original || duplicates.is_empty() {
            return None;
        }
        let (promoted, rest) = duplicates.split_first()?;
        let plan = RepairPlan {
            promote: promoted.id.clone(),
            repoint: rest.iter().map(|d| d.id.clone()).collect(),
        };
        debug!(
            deleted = %record.id,
            promoted = %plan.promote,
            repointed = plan.repoint.len(),
            "planned duplicate-graph repair"
        );
        Some(plan)
    }
}
