//! Text similarity via character-level sequence matching.

use similar::TextDiff;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Scores two text files with a sequence-matcher ratio: `2*M / T` where `M`
/// is the matched character count of the alignment and `T` the sum of both
/// lengths.
///
/// A UTF-8 decode failure means "not comparable" and scores 0.0; so does any
/// other read error.
pub(super) fn score(path_a: &Path, path_b: &Path) -> f32 {
    let text_a = match fs::read_to_string(path_a) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path_a.display(), error = %e, "text comparison: unreadable or non-UTF-8");
            return 0.0;
        },
    };
    let text_b = match fs::read_to_string(path_b) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path_b.display(), error = %e, "text comparison: unreadable or non-UTF-8");
            return 0.0;
        },
    };

    TextDiff::from_chars(text_a.as_str(), text_b.as_str()).ratio()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_identical_files_score_one() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", b"the quick brown fox\n");
        let b = write(dir.path(), "b.txt", b"the quick brown fox\n");
        assert!((score(&a, &b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_disjoint_equal_length_scores_near_zero() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", b"aaaaaaaaaaaaaaaa");
        let b = write(dir.path(), "b.txt", b"bbbbbbbbbbbbbbbb");
        assert!(score(&a, &b) < 0.05);
    }

    #[test]
    fn test_partial_overlap_scores_between() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", b"shared prefix ends here");
        let b = write(dir.path(), "b.txt", b"shared prefix then diverges");
        let s = score(&a, &b);
        assert!(s > 0.4 && s < 1.0);
    }

    #[test]
    fn test_invalid_utf8_scores_zero() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", &[0xFF, 0xFE, 0x00, 0x41]);
        let b = write(dir.path(), "b.txt", b"valid text");
        assert!(score(&a, &b).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_file_scores_zero() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", b"exists");
        let missing = dir.path().join("missing.txt");
        assert!(score(&a, &missing).abs() < f32::EPSILON);
        assert!(score(&missing, &a).abs() < f32::EPSILON);
    }
}
