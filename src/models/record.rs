//! File records, identifiers, and owner scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a file record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Creates a new file ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random (v4 UUID) file ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The identity that partitions all quota, lookup, and sequencing operations.
///
/// Every record created through the upload path belongs to exactly one scope:
/// an authenticated user or an anonymous session. The enum makes "never both,
/// never neither" structural rather than a convention to police.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum OwnerScope {
    /// An authenticated user identity.
    User(String),
    /// An anonymous session identity.
    Session(String),
}

impl OwnerScope {
    /// Creates a user-owned scope.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Creates a session-owned scope.
    #[must_use]
    pub fn session(id: impl Into<String>) -> Self {
        Self::Session(id.into())
    }

    /// Returns the scope kind as a string slice ("user" or "session").
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Session(_) => "session",
        }
    }

    /// Returns the scope identity string.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Session(id) => id,
        }
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// One logical upload: either an original or a link to a near-duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique identifier.
    pub id: FileId,
    /// Blob store key for the raw bytes.
    pub blob_locator: String,
    /// Filename as uploaded.
    pub original_filename: String,
    /// Declared MIME content type.
    pub content_type: String,
    /// Byte size of the content.
    pub size: u64,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last update timestamp (Unix epoch seconds).
    pub updated_at: u64,
    /// Owning user or session.
    pub owner: OwnerScope,
    /// Lowercase hex SHA-256 digest of the content (64 chars).
    pub content_digest: String,
    /// Whether this record is a canonical original.
    ///
    /// Only originals count toward storage quota and serve as duplicate-link
    /// targets.
    pub is_original: bool,
    /// Back-reference to the original, set only when `is_original` is false.
    ///
    /// Graph depth is exactly 1: the target is always itself an original.
    pub original_ref: Option<FileId>,
    /// Number of duplicate records linked to this original. Informational.
    pub reference_count: u32,
    /// Similarity score against the original, set only on near-duplicate links.
    pub similarity_score: Option<f32>,
    /// Display-name disambiguation sequence. 0 means "no suffix".
    pub sequence_number: u32,
}

impl FileRecord {
    /// Renders the display name, appending `_{n}` before the extension when
    /// the sequence number is greater than zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use filedup::{FileId, FileRecord, OwnerScope};
    ///
    /// let mut record = FileRecord::new_original(
    ///     FileId::new("f1"),
    ///     "blob-key".to_string(),
    ///     "report.txt".to_string(),
    ///     "text/plain".to_string(),
    ///     42,
    ///     OwnerScope::user("alice"),
    ///     "0".repeat(64),
    ///     1_700_000_000,
    /// );
    /// assert_eq!(record.display_name(), "report.txt");
    /// record.sequence_number = 2;
    /// assert_eq!(record.display_name(), "report_2.txt");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.sequence_number == 0 {
            return self.original_filename.clone();
        }
        let (stem, ext) = split_filename(&self.original_filename);
        format!("{stem}_{n}{ext}", n = self.sequence_number)
    }

    /// Constructs a new original record.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new_original(
        id: FileId,
        blob_locator: String,
        original_filename: String,
        content_type: String,
        size: u64,
        owner: OwnerScope,
        content_digest: String,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            blob_locator,
            original_filename,
            content_type,
            size,
            created_at,
            updated_at: created_at,
            owner,
            content_digest,
            is_original: true,
            original_ref: None,
            reference_count: 0,
            similarity_score: None,
            sequence_number: 0,
        }
    }

    /// Bytes this record contributes to quota: its size for originals,
    /// zero for duplicates.
    #[must_use]
    pub const fn storage_impact(&self) -> u64 {
        if self.is_original { self.size } else { 0 }
    }
}

/// Splits a filename into stem and extension, keeping the dot on the
/// extension ("report.txt" -> ("report", ".txt")).
///
/// Files without an extension yield an empty extension part.
#[must_use]
pub fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        // A leading dot (".gitignore") is part of the stem, not an extension.
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    }
}

/// Per-scope storage usage summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Bytes consumed by originals in the scope.
    pub used: u64,
    /// The configured quota in bytes.
    pub limit: u64,
    /// Percentage of the quota consumed (0.0 to 100.0).
    pub percentage: f64,
}

impl StorageUsage {
    /// Builds a usage summary from used bytes and a limit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(used: u64, limit: u64) -> Self {
        let percentage = if limit == 0 {
            0.0
        } else {
            (used as f64 / limit as f64) * 100.0
        };
        Self {
            used,
            limit,
            percentage,
        }
    }
}
