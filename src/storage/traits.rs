//! Record store and blob store traits.

use crate::Result;
use crate::models::{FileId, FileRecord, OwnerScope};
use std::path::{Path, PathBuf};

/// Graph repair to apply atomically with an original's deletion.
///
/// Produced by the ownership linker when a deleted original leaves duplicates
/// behind: one duplicate is promoted to original and the rest are re-pointed
/// at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    /// The duplicate to promote (`is_original = true`, `original_ref = None`).
    pub promote: FileId,
    /// Remaining duplicates whose `original_ref` moves to the promoted record.
    pub repoint: Vec<FileId>,
}

/// Trait for the file-record metadata store.
///
/// The record store is the authoritative source of truth for file metadata.
/// All scope-filtered queries must be exact on owner scope: the store is
/// shared across requests and cross-tenant visibility is a correctness bug,
/// not a performance concern.
pub trait RecordStore: Send + Sync {
    /// Inserts a record.
    ///
    /// Enforces graph depth 1 at the write boundary: a record whose
    /// `original_ref` targets a non-original (or missing) record is rejected
    /// with [`crate::Error::InvalidInput`]. Inserting a duplicate link
    /// increments the target original's `reference_count` in the same
    /// transaction.
    fn insert(&self, record: &FileRecord) -> Result<()>;

    /// Retrieves a record by ID.
    fn get(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Finds the in-scope original with the given content digest, if any.
    ///
    /// When several originals share a digest the earliest-created wins, so
    /// exact-match resolution stays reproducible regardless of query order.
    fn find_original_by_digest(
        &self,
        owner: &OwnerScope,
        digest: &str,
    ) -> Result<Option<FileRecord>>;

    /// Lists in-scope originals whose content type is in the given MIME set,
    /// ordered by creation time ascending.
    fn find_originals_by_mime(
        &self,
        owner: &OwnerScope,
        mime_types: &[&str],
    ) -> Result<Vec<FileRecord>>;

    /// Lists in-scope records whose filename starts with the given stem
    /// (string prefix, so "report" matches "`report_2024.txt`").
    fn find_by_stem_prefix(&self, owner: &OwnerScope, stem: &str) -> Result<Vec<FileRecord>>;

    /// Lists duplicates linked to the given original, newest first.
    fn duplicates_of(&self, id: &FileId) -> Result<Vec<FileRecord>>;

    /// Sums `size` across in-scope originals. Duplicates contribute zero.
    fn used_bytes(&self, owner: &OwnerScope) -> Result<u64>;

    /// Deletes a record, applying the repair plan (promotion + re-pointing)
    /// in the same transaction when one is given.
    ///
    /// Either every step commits or none does; a partial failure rolls back
    /// and surfaces [`crate::Error::GraphRepair`]. Returns false when the
    /// record did not exist.
    fn apply_delete(&self, id: &FileId, plan: Option<&RepairPlan>) -> Result<bool>;

    /// Returns the total record count (diagnostics).
    fn count(&self) -> Result<usize>;
}

/// Trait for raw-byte storage.
///
/// Locators are opaque to callers; only the blob store interprets them.
/// `local_path` exposes an on-disk location because the similarity scorers
/// operate on whole files, not in-memory buffers.
pub trait BlobStore: Send + Sync {
    /// Persists the file at `source` (an upload spool) and returns its locator.
    fn store(&self, source: &Path) -> Result<String>;

    /// Reads the full content for a locator.
    fn read(&self, locator: &str) -> Result<Vec<u8>>;

    /// Deletes the content for a locator.
    fn delete(&self, locator: &str) -> Result<()>;

    /// Returns the on-disk path for a locator.
    fn local_path(&self, locator: &str) -> PathBuf;

    /// Checks whether content exists for a locator.
    fn exists(&self, locator: &str) -> bool;
}
