//! # Filedup
//!
//! Content-aware file deduplication and similarity-matching engine.
//!
//! Filedup ingests user- or session-scoped file uploads, deduplicates them by
//! content digest, and flags near-duplicates through category-specific
//! similarity scoring (text, PDF, image). Storage quota is accounted per owner
//! scope, and the original/duplicate graph is repaired on deletion.
//!
//! ## Features
//!
//! - Streaming SHA-256 content digests with bounded memory
//! - Exact-match lookup plus category-filtered near-duplicate search
//! - Sequence-matcher text ratio, PDF metadata comparison, perceptual image hash
//! - Duplicate display-name sequencing per owner scope
//! - 250 MiB default quota counting originals only
//! - Promotion of a new original when a deleted original leaves duplicates
//!
//! ## Example
//!
//! ```rust,ignore
//! use filedup::{DedupConfig, FileService, OwnerScope};
//!
//! let service = FileService::new(store, blobs, &DedupConfig::default());
//! let outcome = service.upload(
//!     &mut bytes,
//!     "report.txt",
//!     "text/plain",
//!     bytes_len,
//!     &OwnerScope::user("alice"),
//! )?;
//! if outcome.is_duplicate() {
//!     println!("matched existing file with similarity {:?}", outcome.similarity());
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::DedupConfig;
pub use observability::init_logging;
pub use models::{
    FileCategory, FileId, FileRecord, MatchResult, OwnerScope, StorageUsage, UploadOutcome,
};
pub use services::{
    ContentHasher, DuplicateResolver, FileService, NameSequencer, OwnershipLinker,
    SimilarityScorer, StorageAccountant,
};
pub use storage::{BlobStore, FilesystemBlobStore, RecordStore, SqliteRecordStore};

/// Error type for filedup operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `QuotaExceeded` | Incoming size would push the owner scope over its storage limit |
/// | `UnreadableStream` | Source bytes could not be fully read during digest computation |
/// | `GraphRepair` | Original/duplicate promotion or re-pointing failed and was rolled back |
/// | `InvalidInput` | Malformed identifiers, depth-violating duplicate links, unknown record IDs |
/// | `OperationFailed` | SQLite queries fail, blob store I/O errors, lock acquisition timeouts |
///
/// Unsupported file categories are NOT an error: they skip similarity search
/// and are accepted as new originals. Scorer decode/parse failures are never
/// surfaced either; each degrades to a 0.0 score and is logged.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The incoming upload would exceed the owner scope's storage quota.
    ///
    /// Checked before any bytes are durably written, so a rejection leaves
    /// no partial state behind.
    #[error("storage quota exceeded: {used} used + {incoming} incoming > {limit} limit")]
    QuotaExceeded {
        /// Bytes already counted against the scope.
        used: u64,
        /// Size of the rejected upload.
        incoming: u64,
        /// The configured quota in bytes.
        limit: u64,
    },

    /// The upload byte stream could not be read to completion.
    ///
    /// Raised when the source is cut short mid-hash or reading fails.
    /// The upload is rejected with no record persisted.
    #[error("upload stream unreadable: {cause}")]
    UnreadableStream {
        /// The underlying I/O error description.
        cause: String,
    },

    /// Original/duplicate graph repair failed.
    ///
    /// Raised when promotion or re-pointing cannot complete during a delete.
    /// The transaction is rolled back: the original record and its bytes are
    /// preserved.
    #[error("graph repair failed: {cause}")]
    GraphRepair {
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A record ID does not resolve to a stored record
    /// - A duplicate link targets a record that is itself a duplicate
    /// - An owner scope string cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` record store operations fail
    /// - Blob store filesystem I/O errors occur
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for filedup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized to avoid duplicate implementations across the codebase.
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use filedup::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
