//! Upload and match result types.
//!
//! The discriminated [`UploadOutcome`] replaces the mutable "reused existing
//! record" sentinel the upload path would otherwise need.

use super::FileRecord;
use serde::{Deserialize, Serialize};

/// A match found by the duplicate resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The matched original record.
    pub record: FileRecord,
    /// Similarity score in [0, 1]. Exact matches are defined as 1.0.
    pub similarity: f32,
    /// True when the match came from digest equality rather than the scorer.
    pub is_exact: bool,
}

impl MatchResult {
    /// Creates an exact-match result (similarity is 1.0 by definition).
    #[must_use]
    pub const fn exact(record: FileRecord) -> Self {
        Self {
            record,
            similarity: 1.0,
            is_exact: true,
        }
    }

    /// Creates a near-match result from a scorer similarity.
    #[must_use]
    pub const fn near(record: FileRecord, similarity: f32) -> Self {
        Self {
            record,
            similarity,
            is_exact: false,
        }
    }
}

/// Result of an upload operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UploadOutcome {
    /// No match in scope: a new original record was persisted.
    Created {
        /// The newly persisted original.
        record: FileRecord,
    },
    /// Byte-identical content already exists in scope: the existing original
    /// is returned and nothing new was persisted.
    Reused {
        /// The pre-existing original.
        record: FileRecord,
    },
    /// A near-duplicate above threshold was found: a linked duplicate record
    /// was persisted with zero quota impact.
    Linked {
        /// The newly persisted duplicate record.
        record: FileRecord,
        /// The original the duplicate points at.
        original: FileRecord,
        /// The scorer similarity that triggered the link.
        similarity: f32,
    },
}

impl UploadOutcome {
    /// Returns true for [`UploadOutcome::Reused`] and [`UploadOutcome::Linked`].
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        !matches!(self, Self::Created { .. })
    }

    /// The record the caller should surface: the created original, the reused
    /// original, or the linked duplicate.
    #[must_use]
    pub const fn record(&self) -> &FileRecord {
        match self {
            Self::Created { record } | Self::Reused { record } | Self::Linked { record, .. } => {
                record
            },
        }
    }

    /// Similarity of the match, if any. Reuse is by definition 1.0.
    #[must_use]
    pub const fn similarity(&self) -> Option<f32> {
        match self {
            Self::Created { .. } => None,
            Self::Reused { .. } => Some(1.0),
            Self::Linked { similarity, .. } => Some(*similarity),
        }
    }
}
