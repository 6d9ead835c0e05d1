//! Display-name sequencing for duplicate filenames.

use crate::Result;
use crate::models::{OwnerScope, split_filename};
use crate::storage::traits::RecordStore;
use std::sync::Arc;
use tracing::instrument;

/// Assigns collision-free display sequence numbers within an owner scope.
///
/// Sequence 0 means "no suffix"; higher values render as `stem_{n}{ext}`.
pub struct NameSequencer<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> NameSequencer<S> {
    /// Creates a sequencer over the given record store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the next sequence number for a filename in scope.
    ///
    /// Prefix-matches the new filename's stem against existing in-scope
    /// filenames ("report" matches "`report_2024.txt`"), returning 0 when
    /// nothing matches and `max(existing) + 1` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store query fails.
    #[instrument(skip(self), fields(owner = %owner, filename = filename))]
    pub fn next_sequence(&self, filename: &str, owner: &OwnerScope) -> Result<u32> {
        let (stem, _ext) = split_filename(filename);
        let existing = self.store.find_by_stem_prefix(owner, stem)?;

        Ok(existing
            .iter()
            .map(|record| record.sequence_number)
            .max()
            .map_or(0, |highest| highest + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileId, FileRecord};
    use crate::storage::SqliteRecordStore;

    fn seed(store: &SqliteRecordStore, id: &str, owner: &OwnerScope, filename: &str, seq: u32) {
        let mut record = FileRecord::new_original(
            FileId::new(id),
            format!("blob-{id}"),
            filename.to_string(),
            "text/plain".to_string(),
            10,
            owner.clone(),
            format!("{id:0>64}"),
            100,
        );
        record.sequence_number = seq;
        store.insert(&record).unwrap();
    }

    #[test]
    fn test_first_upload_gets_zero() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let sequencer = NameSequencer::new(Arc::clone(&store));
        let owner = OwnerScope::user("alice");

        assert_eq!(sequencer.next_sequence("a.txt", &owner).unwrap(), 0);
    }

    #[test]
    fn test_max_plus_one() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let owner = OwnerScope::user("alice");
        seed(&store, "f0", &owner, "a.txt", 0);
        seed(&store, "f1", &owner, "a.txt", 1);
        seed(&store, "f2", &owner, "a.txt", 2);

        let sequencer = NameSequencer::new(Arc::clone(&store));
        assert_eq!(sequencer.next_sequence("a.txt", &owner).unwrap(), 3);
    }

    #[test]
    fn test_prefix_match_includes_longer_stems() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let owner = OwnerScope::user("alice");
        seed(&store, "f0", &owner, "report_2024.txt", 5);

        let sequencer = NameSequencer::new(Arc::clone(&store));
        // "report" prefix-matches "report_2024.txt"
        assert_eq!(sequencer.next_sequence("report.txt", &owner).unwrap(), 6);
    }

    #[test]
    fn test_scopes_sequence_independently() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let alice = OwnerScope::user("alice");
        let session = OwnerScope::session("s1");
        seed(&store, "f0", &alice, "a.txt", 4);

        let sequencer = NameSequencer::new(Arc::clone(&store));
        assert_eq!(sequencer.next_sequence("a.txt", &session).unwrap(), 0);
        assert_eq!(sequencer.next_sequence("a.txt", &alice).unwrap(), 5);
    }

    #[test]
    fn test_unrelated_stems_do_not_collide() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let owner = OwnerScope::user("alice");
        seed(&store, "f0", &owner, "budget.txt", 7);

        let sequencer = NameSequencer::new(Arc::clone(&store));
        assert_eq!(sequencer.next_sequence("notes.txt", &owner).unwrap(), 0);
    }
}
