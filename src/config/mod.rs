//! Deduplication engine configuration.
//!
//! The quota limit and similarity threshold are explicit configuration passed
//! into the services at construction, not hidden module constants, so they
//! stay testable and overridable.

/// Default storage quota per owner scope: 250 MiB.
pub const DEFAULT_QUOTA_BYTES: u64 = 250 * 1024 * 1024;

/// Default similarity threshold for near-duplicate classification.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Default chunk size for streaming digest computation.
pub const DEFAULT_HASH_BUFFER_BYTES: usize = 8 * 1024;

/// Configuration for the deduplication engine.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `FILEDUP_QUOTA_BYTES` | u64 | `262144000` | Per-scope storage quota |
/// | `FILEDUP_SIMILARITY_THRESHOLD` | f32 | `0.8` | Near-duplicate threshold |
/// | `FILEDUP_HASH_BUFFER_BYTES` | usize | `8192` | Digest read chunk size |
///
/// # Example
///
/// ```rust
/// use filedup::DedupConfig;
///
/// let config = DedupConfig::default();
/// assert_eq!(config.quota_bytes, 250 * 1024 * 1024);
/// assert!((config.similarity_threshold - 0.8).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Per-scope storage quota in bytes. Originals only count against it.
    pub quota_bytes: u64,

    /// Minimum similarity score for a near-duplicate match.
    pub similarity_threshold: f32,

    /// Chunk size used while streaming bytes through the digest.
    pub hash_buffer_bytes: usize,
}

impl DedupConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults for any unset variable.
    #[must_use]
    pub fn from_env() -> Self {
        let quota_bytes = std::env::var("FILEDUP_QUOTA_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QUOTA_BYTES);

        let similarity_threshold = std::env::var("FILEDUP_SIMILARITY_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

        let hash_buffer_bytes = std::env::var("FILEDUP_HASH_BUFFER_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HASH_BUFFER_BYTES);

        Self {
            quota_bytes,
            similarity_threshold,
            hash_buffer_bytes,
        }
    }

    /// Builder method to set the quota limit.
    #[must_use]
    pub const fn with_quota_bytes(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Builder method to set the similarity threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Builder method to set the digest chunk size.
    #[must_use]
    pub const fn with_hash_buffer_bytes(mut self, bytes: usize) -> Self {
        self.hash_buffer_bytes = bytes;
        self
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            hash_buffer_bytes: DEFAULT_HASH_BUFFER_BYTES,
        }
    }
}
