//! File categories and the MIME types recognized for each.
//!
//! Categories are a closed set: adding one is an explicit enum extension,
//! not an open-ended registry. Dispatch over categories happens in a single
//! place (`services::similarity`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity-comparison category for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// Plain-text-like content (plain, CSV, HTML).
    Text,
    /// PDF documents.
    Pdf,
    /// Raster images (JPEG, PNG, GIF).
    Image,
    /// Anything else. Never matches in similarity search.
    Other,
}

impl FileCategory {
    /// Maps a declared MIME content type to its category.
    ///
    /// Unrecognized types map to [`FileCategory::Other`], which skips
    /// similarity search entirely.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use filedup::FileCategory;
    ///
    /// assert_eq!(FileCategory::from_mime("text/csv"), FileCategory::Text);
    /// assert_eq!(FileCategory::from_mime("application/pdf"), FileCategory::Pdf);
    /// assert_eq!(FileCategory::from_mime("image/png"), FileCategory::Image);
    /// assert_eq!(FileCategory::from_mime("video/mp4"), FileCategory::Other);
    /// ```
    #[must_use]
    pub fn from_mime(content_type: &str) -> Self {
        for category in [Self::Text, Self::Pdf, Self::Image] {
            if category.mime_types().contains(&content_type) {
                return category;
            }
        }
        Self::Other
    }

    /// Returns the fixed set of MIME types recognized for this category.
    ///
    /// [`FileCategory::Other`] has an empty set: no similarity search is
    /// attempted for it.
    #[must_use]
    pub const fn mime_types(self) -> &'static [&'static str] {
        match self {
            Self::Text => &["text/plain", "text/csv", "text/html"],
            Self::Pdf => &["application/pdf"],
            Self::Image => &["image/jpeg", "image/png", "image/gif"],
            Self::Other => &[],
        }
    }

    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Other => "other",
        }
    }

    /// Returns true if similarity scoring is supported for this category.
    #[must_use]
    pub const fn is_comparable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("text/plain", FileCategory::Text)]
    #[test_case("text/csv", FileCategory::Text)]
    #[test_case("text/html", FileCategory::Text)]
    #[test_case("application/pdf", FileCategory::Pdf)]
    #[test_case("image/jpeg", FileCategory::Image)]
    #[test_case("image/png", FileCategory::Image)]
    #[test_case("image/gif", FileCategory::Image)]
    #[test_case("application/zip", FileCategory::Other)]
    #[test_case("text/markdown", FileCategory::Other)]
    #[test_case("", FileCategory::Other)]
    fn test_from_mime(mime: &str, expected: FileCategory) {
        assert_eq!(FileCategory::from_mime(mime), expected);
    }

    #[test]
    fn test_mime_table_is_disjoint() {
        let all: Vec<&str> = [FileCategory::Text, FileCategory::Pdf, FileCategory::Image]
            .iter()
            .flat_map(|c| c.mime_types().iter().copied())
            .collect();
        let mut deduped = all.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(all.len(), deduped.len());
    }

    #[test]
    fn test_other_is_not_comparable() {
        assert!(!FileCategory::Other.is_comparable());
        assert!(FileCategory::Text.is_comparable());
        assert!(FileCategory::Other.mime_types().is_empty());
    }
}
