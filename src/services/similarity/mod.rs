//! Category-specific similarity scoring.
//!
//! One dispatch point over the closed category set. Every failure path inside
//! a scorer degrades to a 0.0 score: a file that cannot be decoded is "not
//! comparable", not a system fault, and must never crash the caller.

mod image;
mod pdf;
mod text;

use crate::models::FileCategory;
use std::path::Path;

/// Similarity scorer over stored file content.
///
/// # Example
///
/// ```rust,ignore
/// use filedup::{FileCategory, SimilarityScorer};
///
/// let scorer = SimilarityScorer::new();
/// let score = scorer.score(FileCategory::Text, &path_a, &path_b);
/// assert!((0.0..=1.0).contains(&score));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    /// Creates a scorer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Scores the similarity of two files in `[0, 1]` for the given category.
    ///
    /// Never errors: decode and parse failures are logged and score 0.0.
    /// [`FileCategory::Other`] always scores 0.0.
    #[must_use]
    pub fn score(self, category: FileCategory, path_a: &Path, path_b: &Path) -> f32 {
        let score = match category {
            FileCategory::Text => text::score(path_a, path_b),
            FileCategory::Pdf => pdf::score(path_a, path_b),
            FileCategory::Image => image::score(path_a, path_b),
            FileCategory::Other => {
                tracing::debug!(category = %category, "unsupported category, scoring 0.0");
                0.0
            },
        };
        tracing::debug!(
            category = %category,
            path_a = %path_a.display(),
            path_b = %path_b.display(),
            score = score,
            "similarity scored"
        );
        score.clamp(0.0, 1.0)
    }
}
