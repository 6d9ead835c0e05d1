//! Filesystem blob store.
//!
//! Stores raw upload bytes in a directory hierarchy keyed by random UUIDs.
//! Locator format: `blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`, which keeps
//! directory fan-out bounded regardless of upload volume.

use crate::storage::traits::BlobStore;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Blob store backed by a local directory.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Creates a blob store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn next_locator() -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("blobs/{}/{}/{id}.bin", &id[..2], &id[2..4])
    }
}

impl BlobStore for FilesystemBlobStore {
    fn store(&self, source: &Path) -> Result<String> {
        let locator = Self::next_locator();
        let target = self.local_path(&locator);
        debug!(locator = %locator, source = %source.display(), "blob store: write");

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "blob_create_dirs".to_string(),
                cause: e.to_string(),
            })?;
        }

        // Copy rather than rename: the source spool may live on another
        // filesystem (tempdir vs blob volume).
        fs::copy(source, &target).map_err(|e| Error::OperationFailed {
            operation: "blob_write".to_string(),
            cause: e.to_string(),
        })?;

        Ok(locator)
    }

    fn read(&self, locator: &str) -> Result<Vec<u8>> {
        fs::read(self.local_path(locator)).map_err(|e| Error::OperationFailed {
            operation: "blob_read".to_string(),
            cause: format!("{locator}: {e}"),
        })
    }

    fn delete(&self, locator: &str) -> Result<()> {
        debug!(locator = %locator, "blob store: delete");
        fs::remove_file(self.local_path(locator)).map_err(|e| Error::OperationFailed {
            operation: "blob_delete".to_string(),
            cause: format!("{locator}: {e}"),
        })
    }

    fn local_path(&self, locator: &str) -> PathBuf {
        self.base_path.join(locator)
    }

    fn exists(&self, locator: &str) -> bool {
        self.local_path(locator).exists()
    }
}
