//! Name-based image inventory diff.
//!
//! Inventories are sets of file names, not contents: a file rewritten in place
//! under a name that existed before the run is not reported as new. This is a
//! known limitation of the diff, not something the caller should paper over.

use std::collections::BTreeSet;
use std::path::Path;

/// Recognized image extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// True when `name` has one of [`IMAGE_EXTENSIONS`].
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Names present in `after` but not in `before`, sorted.
pub fn new_artifacts(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Vec<String> {
    after.difference(before).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn image_names_match_case_insensitively() {
        assert!(is_image_name("plot.PNG"));
        assert!(is_image_name("photo.JpEg"));
        assert!(is_image_name("a.webp"));
        assert!(!is_image_name("data.csv"));
        assert!(!is_image_name("png"));
        assert!(!is_image_name("figure.svg"));
    }

    #[test]
    fn diff_is_sorted_and_ignores_removed_names() {
        let before = set(&["old.png", "gone.png"]);
        let after = set(&["old.png", "z.png", "a.jpg"]);
        assert_eq!(new_artifacts(&before, &after), vec!["a.jpg", "z.png"]);
    }

    #[test]
    fn rewritten_name_is_not_new() {
        let before = set(&["a.png"]);
        assert!(new_artifacts(&before, &before.clone()).is_empty());
    }
}
