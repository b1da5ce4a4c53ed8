//! Image inventory snapshots of a working directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::artifacts::is_image_name;

/// Names of recognized image files directly inside `dir` (non-recursive).
///
/// Sub-directories are skipped even when their names look like images, and
/// entries with non-UTF-8 names are ignored.
pub fn snapshot(dir: &Path) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && is_image_name(name)
        {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}
