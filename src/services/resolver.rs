//! Duplicate resolution: exact-hash lookup, then category-filtered
//! similarity search.

use crate::models::{FileCategory, FileRecord, MatchResult, OwnerScope};
use crate::services::similarity::SimilarityScorer;
use crate::storage::traits::{BlobStore, RecordStore};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Resolves whether incoming content duplicates an in-scope original.
///
/// Pure read/compare: the resolver never persists anything. The caller
/// decides whether to reuse the match, link a duplicate, or create a new
/// original.
pub struct DuplicateResolver<S: RecordStore, B: BlobStore> {
    store: Arc<S>,
    blobs: Arc<B>,
    scorer: SimilarityScorer,
    threshold: f32,
}

impl<S: RecordStore, B: BlobStore> DuplicateResolver<S, B> {
    /// Creates a resolver over the given stores with a similarity threshold.
    #[must_use]
    pub const fn new(store: Arc<S>, blobs: Arc<B>, threshold: f32) -> Self {
        Self {
            store,
            blobs,
            scorer: SimilarityScorer::new(),
            threshold,
        }
    }

    /// Returns the configured near-duplicate threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Scores a pair of stored records.
    ///
    /// Digest equality is defined as exactly 1.0 and short-circuits the
    /// scorer entirely: bytes-identical implies maximal similarity without
    /// invoking category logic.
    #[must_use]
    pub fn check_pair(&self, a: &FileRecord, b: &FileRecord) -> f32 {
        if a.content_digest == b.content_digest {
            return 1.0;
        }
        let category = FileCategory::from_mime(&a.content_type);
        self.scorer.score(
            category,
            &self.blobs.local_path(&a.blob_locator),
            &self.blobs.local_path(&b.blob_locator),
        )
    }

    /// Finds the best in-scope match for incoming content.
    ///
    /// `content_path` is where the incoming bytes currently live (the upload
    /// spool); the scorer reads candidates from the blob store.
    ///
    /// 1. An original with the identical digest is an exact match
    ///    (earliest-created wins, similarity 1.0).
    /// 2. Otherwise same-category originals are scored pairwise; the
    ///    strictly highest score at or above the threshold wins, ties going
    ///    to the earliest-created candidate.
    /// 3. Unrecognized content types skip similarity search entirely.
    ///
    /// # Errors
    ///
    /// Returns an error only when a record-store query fails; scoring
    /// failures degrade to 0.0 inside the scorer.
    #[instrument(skip(self, content_path), fields(owner = %owner, content_type = content_type))]
    pub fn find_match(
        &self,
        owner: &OwnerScope,
        digest: &str,
        content_type: &str,
        content_path: &Path,
    ) -> Result<Option<MatchResult>> {
        if let Some(original) = self.store.find_original_by_digest(owner, digest)? {
            info!(matched = %original.id, "exact digest match found");
            metrics::counter!("filedup_dedup_matches_total", "reason" => "exact").increment(1);
            return Ok(Some(MatchResult::exact(original)));
        }

        let category = FileCategory::from_mime(content_type);
        if !category.is_comparable() {
            debug!("content type maps to no known category, skipping similarity search");
            return Ok(None);
        }

        let candidates = self
            .store
            .find_originals_by_mime(owner, category.mime_types())?;
        debug!(count = candidates.len(), category = %category, "scoring candidates");

        // Candidates arrive ordered by creation time ascending, so keeping
        // only strictly-better scores breaks ties toward the earliest.
        let mut best: Option<(FileRecord, f32)> = None;
        for candidate in candidates {
            let score = self.scorer.score(
                category,
                content_path,
                &self.blobs.local_path(&candidate.blob_locator),
            );
            if score < self.threshold {
                continue;
            }
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((candidate, score));
            }
        }

        Ok(best.map(|(record, similarity)| {
            info!(matched = %record.id, similarity = similarity, "near-duplicate match found");
            metrics::counter!("filedup_dedup_matches_total", "reason" => "near").increment(1);
            MatchResult::near(record, similarity)
        }))
    }
}
