//! PDF similarity via page count and metadata comparison.

use lopdf::{Document, Object};
use similar::TextDiff;
use std::path::Path;
use tracing::{debug, warn};

/// Scores two PDF documents.
///
/// Differing page counts short-circuit to a fixed 0.5: different length means
/// likely different, but not conclusively so. Equal page counts compare the
/// serialized Info dictionaries with the same sequence ratio used for text.
/// Parse failures score 0.0.
pub(super) fn score(path_a: &Path, path_b: &Path) -> f32 {
    let doc_a = match Document::load(path_a) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path_a.display(), error = %e, "pdf comparison: parse failed");
            return 0.0;
        },
    };
    let doc_b = match Document::load(path_b) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path_b.display(), error = %e, "pdf comparison: parse failed");
            return 0.0;
        },
    };

    if doc_a.get_pages().len() != doc_b.get_pages().len() {
        debug!("pdf comparison: page counts differ");
        return 0.5;
    }

    let meta_a = metadata_string(&doc_a);
    let meta_b = metadata_string(&doc_b);
    TextDiff::from_chars(meta_a.as_str(), meta_b.as_str()).ratio()
}

/// Serializes the document's Info dictionary for comparison.
///
/// Missing or unresolvable metadata serializes to the empty string; two
/// documents both without metadata therefore compare equal.
fn metadata_string(doc: &Document) -> String {
    let info = match doc.trailer.get(b"Info") {
        Ok(object) => object,
        Err(_) => return String::new(),
    };

    let resolved = match info {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(object) => object,
            Err(_) => return String::new(),
        },
        other => other,
    };

    format!("{resolved:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use std::fs;
    use std::path::PathBuf;

    fn make_pdf(dir: &Path, name: &str, pages: usize, title: Option<&str>) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();

        #[allow(clippy::cast_possible_wrap)]
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
            });
            doc.trailer.set("Info", info_id);
        }

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    #[test]
    fn test_page_count_mismatch_is_half() {
        let dir = tempfile::tempdir().unwrap();
        let one = make_pdf(dir.path(), "one.pdf", 1, Some("same"));
        let two = make_pdf(dir.path(), "two.pdf", 2, Some("same"));
        let s = score(&one, &two);
        assert!((s - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_matching_metadata_scores_one() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_pdf(dir.path(), "a.pdf", 2, Some("quarterly report"));
        let b = make_pdf(dir.path(), "b.pdf", 2, Some("quarterly report"));
        assert!((score(&a, &b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_no_metadata_on_either_side_scores_one() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_pdf(dir.path(), "a.pdf", 1, None);
        let b = make_pdf(dir.path(), "b.pdf", 1, None);
        assert!((score(&a, &b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_differing_metadata_scores_below_one() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_pdf(dir.path(), "a.pdf", 1, Some("alpha"));
        let b = make_pdf(dir.path(), "b.pdf", 1, Some("omega"));
        let s = score(&a, &b);
        assert!(s < 1.0);
    }

    #[test]
    fn test_unparseable_file_scores_zero() {
        let dir = tempfile::tempdir().unwrap();
        let good = make_pdf(dir.path(), "good.pdf", 1, None);
        let bad = dir.path().join("bad.pdf");
        fs::write(&bad, b"not a pdf at all").unwrap();
        assert!(score(&good, &bad).abs() < f32::EPSILON);
    }
}
