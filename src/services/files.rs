//! Upload, deletion, and usage orchestration.

use crate::config::DedupConfig;
use crate::models::{FileId, FileRecord, OwnerScope, StorageUsage, UploadOutcome};
use crate::services::hasher::ContentHasher;
use crate::services::linker::OwnershipLinker;
use crate::services::quota::StorageAccountant;
use crate::services::resolver::DuplicateResolver;
use crate::services::sequencer::NameSequencer;
use crate::storage::traits::{BlobStore, RecordStore};
use crate::{Error, Result, current_timestamp};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, instrument, warn};

/// The public face of the engine: uploads, deletions, and usage queries.
///
/// Uploads within one owner scope are serialized through a per-scope lock so
/// two concurrent uploads of the same content cannot both miss the digest
/// lookup and persist two originals. Different scopes proceed in parallel.
pub struct FileService<S: RecordStore, B: BlobStore> {
    store: Arc<S>,
    blobs: Arc<B>,
    hasher: ContentHasher,
    resolver: DuplicateResolver<S, B>,
    sequencer: NameSequencer<S>,
    accountant: StorageAccountant<S>,
    linker: OwnershipLinker,
    scope_locks: Mutex<HashMap<OwnerScope, Arc<Mutex<()>>>>,
    orphans: Mutex<Vec<String>>,
}

impl<S: RecordStore, B: BlobStore> FileService<S, B> {
    /// Wires the service from its stores and configuration.
    #[must_use]
    pub fn new(store: Arc<S>, blobs: Arc<B>, config: &DedupConfig) -> Self {
        Self {
            resolver: DuplicateResolver::new(
                Arc::clone(&store),
                Arc::clone(&blobs),
                config.similarity_threshold,
            ),
            sequencer: NameSequencer::new(Arc::clone(&store)),
            accountant: StorageAccountant::new(Arc::clone(&store), config.quota_bytes),
            hasher: ContentHasher::new(config.hash_buffer_bytes),
            linker: OwnershipLinker::new(),
            scope_locks: Mutex::new(HashMap::new()),
            orphans: Mutex::new(Vec::new()),
            store,
            blobs,
        }
    }

    fn scope_lock(&self, owner: &OwnerScope) -> Arc<Mutex<()>> {
        let mut registry = self
            .scope_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A strong count of 1 means no holder and no waiter: the registry
        // stays bounded by concurrently active scopes, not scopes ever seen.
        registry.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(registry.entry(owner.clone()).or_default())
    }

    /// Ingests one upload and resolves it against the owner's existing files.
    ///
    /// `size` is the declared content length; it gates the quota check before
    /// any byte is read and must match what the stream actually yields. The
    /// stream is spooled to a temp file while being hashed, then resolved:
    ///
    /// 1. Byte-identical content in scope → [`UploadOutcome::Reused`], nothing
    ///    persisted.
    /// 2. A same-category original scoring at or above the similarity
    ///    threshold → [`UploadOutcome::Linked`], a duplicate record pointing
    ///    at the original. Its bytes are stored but count nothing toward
    ///    quota.
    /// 3. Otherwise → [`UploadOutcome::Created`], a new original with a
    ///    disambiguating sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] when the declared size does not fit,
    /// [`Error::UnreadableStream`] when the stream fails mid-read,
    /// [`Error::InvalidInput`] when the stream length contradicts `size`, and
    /// storage errors from the record or blob store.
    #[instrument(skip(self, source), fields(owner = %owner, filename = filename, size = size))]
    #[allow(clippy::cast_precision_loss)]
    pub fn upload(
        &self,
        source: &mut dyn Read,
        filename: &str,
        content_type: &str,
        size: u64,
        owner: &OwnerScope,
    ) -> Result<UploadOutcome> {
        let lock = self.scope_lock(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.accountant.check_quota(owner, size)?;

        let mut spool = tempfile::NamedTempFile::new().map_err(|e| Error::OperationFailed {
            operation: "upload_spool".to_string(),
            cause: e.to_string(),
        })?;
        let (digest, spooled) = self.hasher.digest_with_copy(source, spool.as_file_mut())?;
        if spooled != size {
            return Err(Error::InvalidInput(format!(
                "declared size {size} but stream yielded {spooled} bytes"
            )));
        }
        metrics::histogram!("filedup_upload_bytes").record(spooled as f64);

        let matched = self
            .resolver
            .find_match(owner, &digest, content_type, spool.path())?;

        let outcome = match matched {
            Some(m) if m.is_exact => {
                info!(original = %m.record.id, "reusing byte-identical original");
                UploadOutcome::Reused { record: m.record }
            },
            Some(m) => self.persist_duplicate(
                spool.path(),
                filename,
                content_type,
                spooled,
                owner,
                &digest,
                m.record,
                m.similarity,
            )?,
            None => self.persist_original(
                spool.path(),
                filename,
                content_type,
                spooled,
                owner,
                &digest,
            )?,
        };

        metrics::counter!("filedup_uploads_total", "outcome" => outcome_label(&outcome))
            .increment(1);
        Ok(outcome)
    }

    fn persist_original(
        &self,
        spool: &std::path::Path,
        filename: &str,
        content_type: &str,
        size: u64,
        owner: &OwnerScope,
        digest: &str,
    ) -> Result<UploadOutcome> {
        let sequence = self.sequencer.next_sequence(filename, owner)?;
        let locator = self.blobs.store(spool)?;
        let mut record = FileRecord::new_original(
            FileId::generate(),
            locator,
            filename.to_string(),
            content_type.to_string(),
            size,
            owner.clone(),
            digest.to_string(),
            current_timestamp(),
        );
        record.sequence_number = sequence;
        self.store.insert(&record)?;
        info!(id = %record.id, sequence = sequence, "created new original");
        Ok(UploadOutcome::Created { record })
    }

    #[allow(clippy::too_many_arguments)]
    fn persist_duplicate(
        &self,
        spool: &std::path::Path,
        filename: &str,
        content_type: &str,
        size: u64,
        owner: &OwnerScope,
        digest: &str,
        original: FileRecord,
        similarity: f32,
    ) -> Result<UploadOutcome> {
        let sequence = self.sequencer.next_sequence(filename, owner)?;
        let locator = self.blobs.store(spool)?;
        let mut record = FileRecord::new_original(
            FileId::generate(),
            locator,
            filename.to_string(),
            content_type.to_string(),
            size,
            owner.clone(),
            digest.to_string(),
            current_timestamp(),
        );
        record.sequence_number = sequence;
        record.is_original = false;
        record.original_ref = Some(original.id.clone());
        record.similarity_score = Some(similarity);
        self.store.insert(&record)?;
        info!(
            id = %record.id,
            original = %original.id,
            similarity = similarity,
            "linked near-duplicate"
        );
        Ok(UploadOutcome::Linked {
            record,
            original,
            similarity,
        })
    }

    /// Deletes a file, repairing the duplicate graph when needed.
    ///
    /// Deleting an original that still has linked duplicates promotes the
    /// newest duplicate to original and re-points the rest, all in the same
    /// record-store transaction as the row deletion. The blob is removed only
    /// after that transaction commits, so a crash between the two leaves at
    /// worst an orphaned blob, never a record without bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown ID and storage errors
    /// from the record store.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&self, id: &FileId) -> Result<()> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| Error::InvalidInput(format!("no file record with id {id}")))?;

        let lock = self.scope_lock(&record.owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let duplicates = self.store.duplicates_of(id)?;
        let plan = self.linker.plan_repair(&record, &duplicates);
        if let Some(plan) = &plan {
            info!(
                promoted = %plan.promote,
                repointed = plan.repoint.len(),
                "deleting original with linked duplicates"
            );
        }
        self.store.apply_delete(id, plan.as_ref())?;

        if let Err(e) = self.blobs.delete(&record.blob_locator) {
            // The record is already gone; an orphaned blob is harmless and
            // recoverable, a hard failure here would not be.
            warn!(locator = %record.blob_locator, error = %e, "blob removal failed after delete");
            metrics::counter!("filedup_blob_orphans_total").increment(1);
            self.orphans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.blob_locator);
        }
        metrics::counter!("filedup_deletes_total").increment(1);
        Ok(())
    }

    /// Drains the locators of blobs whose removal failed after a committed
    /// delete.
    ///
    /// A periodic maintenance sweep can retry or reclaim these; each locator
    /// is handed out once.
    #[must_use]
    pub fn take_orphaned_locators(&self) -> Vec<String> {
        std::mem::take(&mut *self.orphans.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the owner's storage usage against the configured quota.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store query fails.
    pub fn storage_usage(&self, owner: &OwnerScope) -> Result<StorageUsage> {
        self.accountant.usage(owner)
    }

    /// Fetches a single record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store query fails.
    pub fn get(&self, id: &FileId) -> Result<Option<FileRecord>> {
        self.store.get(id)
    }
}

const fn outcome_label(outcome: &UploadOutcome) -> &'static str {
    match outcome {
        UploadOutcome::Created { .. } => "created",
        UploadOutcome::Reused { .. } => "reused",
        UploadOutcome::Linked { .. } => "linked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FilesystemBlobStore, SqliteRecordStore};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct Fixture {
        service: FileService<SqliteRecordStore, FilesystemBlobStore>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        fixture_with(DedupConfig::default())
    }

    fn fixture_with(config: DedupConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let blobs = Arc::new(FilesystemBlobStore::new(dir.path()));
        Fixture {
            service: FileService::new(store, blobs, &config),
            _dir: dir,
        }
    }

    fn upload(
        fx: &Fixture,
        content: &str,
        filename: &str,
        owner: &OwnerScope,
    ) -> UploadOutcome {
        fx.service
            .upload(
                &mut Cursor::new(content.as_bytes().to_vec()),
                filename,
                "text/plain",
                content.len() as u64,
                owner,
            )
            .unwrap()
    }

    #[test]
    fn test_first_upload_creates_original() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let outcome = upload(&fx, "hello world", "a.txt", &owner);
        assert!(matches!(outcome, UploadOutcome::Created { .. }));
        let record = outcome.record();
        assert!(record.is_original);
        assert_eq!(record.size, 11);
        assert!(fx.service.get(&record.id).unwrap().is_some());
    }

    #[test]
    fn test_identical_content_reused() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let first = upload(&fx, "same bytes", "a.txt", &owner);
        let second = upload(&fx, "same bytes", "b.txt", &owner);
        assert!(matches!(second, UploadOutcome::Reused { .. }));
        assert_eq!(second.record().id, first.record().id);
        assert_eq!(second.similarity(), Some(1.0));
        assert_eq!(fx.service.storage_usage(&owner).unwrap().used, 10);
    }

    #[test]
    fn test_near_duplicate_linked() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let original = upload(&fx, "the quick brown fox jumps over the lazy dog", "a.txt", &owner);
        let outcome = upload(&fx, "the quick brown fox jumps over the lazy cog", "b.txt", &owner);
        match outcome {
            UploadOutcome::Linked {
                record,
                original: target,
                similarity,
            } => {
                assert_eq!(target.id, original.record().id);
                assert_eq!(record.original_ref, Some(target.id.clone()));
                assert!(similarity >= 0.8);
                assert!(!record.is_original);
            },
            other => panic!("expected Linked, got {other:?}"),
        }
        // quota counts only the original
        assert_eq!(fx.service.storage_usage(&owner).unwrap().used, 43);
    }

    #[test]
    fn test_quota_gate_rejects_declared_size() {
        let fx = fixture_with(DedupConfig::default().with_quota_bytes(5));
        let owner = OwnerScope::user("alice");
        let err = fx
            .service
            .upload(
                &mut Cursor::new(b"too large".to_vec()),
                "a.txt",
                "text/plain",
                9,
                &owner,
            )
            .unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { incoming: 9, .. }));
    }

    #[test]
    fn test_declared_size_mismatch_rejected() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let err = fx
            .service
            .upload(
                &mut Cursor::new(b"abc".to_vec()),
                "a.txt",
                "text/plain",
                10,
                &owner,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_same_stem_gets_sequence() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let first = upload(&fx, "content one", "report.txt", &owner);
        // different category so it cannot link as a near-duplicate
        let second = fx
            .service
            .upload(
                &mut Cursor::new(b"binary two".to_vec()),
                "report.txt",
                "application/octet-stream",
                10,
                &owner,
            )
            .unwrap();
        assert_eq!(first.record().sequence_number, 0);
        assert_eq!(second.record().sequence_number, 1);
        assert_eq!(second.record().display_name(), "report_1.txt");
    }

    #[test]
    fn test_scope_isolation() {
        let fx = fixture();
        let alice = OwnerScope::user("alice");
        let session = OwnerScope::session("s-1");
        upload(&fx, "shared content", "a.txt", &alice);
        let outcome = upload(&fx, "shared content", "a.txt", &session);
        assert!(matches!(outcome, UploadOutcome::Created { .. }));
    }

    #[test]
    fn test_delete_promotes_newest_duplicate() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let original = upload(&fx, "the quick brown fox jumps over the lazy dog", "a.txt", &owner);
        let d1 = upload(&fx, "the quick brown fox jumps over the lazy cog", "b.txt", &owner);
        let d2 = upload(&fx, "the quick brown fox jumps over the hazy dog", "c.txt", &owner);
        assert!(d1.is_duplicate() && d2.is_duplicate());

        let original_id = original.record().id.clone();
        fx.service.delete(&original_id).unwrap();

        assert!(fx.service.get(&original_id).unwrap().is_none());
        let promoted = fx.service.get(&d2.record().id).unwrap().unwrap();
        assert!(promoted.is_original);
        assert!(promoted.original_ref.is_none());
        let repointed = fx.service.get(&d1.record().id).unwrap().unwrap();
        assert_eq!(repointed.original_ref, Some(promoted.id.clone()));
    }

    #[test]
    fn test_delete_unknown_id() {
        let fx = fixture();
        let err = fx.service.delete(&FileId::new("missing")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_scope_lock_registry_stays_bounded() {
        let fx = fixture();
        for i in 0..16 {
            let owner = OwnerScope::session(format!("s-{i}"));
            upload(&fx, "scoped content", "a.txt", &owner);
        }
        // Every earlier lock is idle by now, so acquiring a fresh one
        // evicts them all.
        let _lock = fx.service.scope_lock(&OwnerScope::user("fresh"));
        let registry_len = fx.service.scope_locks.lock().unwrap().len();
        assert_eq!(registry_len, 1);
    }

    #[test]
    fn test_failed_blob_removal_is_recorded_for_sweep() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let outcome = upload(&fx, "doomed", "a.txt", &owner);
        let locator = outcome.record().blob_locator.clone();

        // Remove the blob out-of-band so the post-commit unlink fails.
        std::fs::remove_file(fx.service.blobs.local_path(&locator)).unwrap();
        fx.service.delete(&outcome.record().id).unwrap();

        assert_eq!(fx.service.take_orphaned_locators(), vec![locator]);
        // Drained: a second sweep sees nothing.
        assert!(fx.service.take_orphaned_locators().is_empty());
    }

    #[test]
    fn test_delete_removes_blob() {
        let fx = fixture();
        let owner = OwnerScope::user("alice");
        let outcome = upload(&fx, "ephemeral", "a.txt", &owner);
        let locator = outcome.record().blob_locator.clone();
        assert!(fx.service.blobs.exists(&locator));
        fx.service.delete(&outcome.record().id).unwrap();
        assert!(!fx.service.blobs.exists(&locator));
    }
}
