//! Working-directory glue used by host surfaces before and after a run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::core::types::FileEntry;

/// Read the script text. Missing or non-UTF-8 scripts are pre-run errors.
pub fn read_script(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("script not found: {}", path.display()));
    }
    fs::read_to_string(path).with_context(|| format!("read script {}", path.display()))
}

/// Save uploaded dataset bytes under the fixed name the script expects.
pub fn place_dataset(workdir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = workdir.join(name);
    fs::write(&path, bytes).with_context(|| format!("write dataset {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "dataset saved");
    Ok(path)
}

/// Require the dataset to already exist in `workdir`.
pub fn ensure_dataset(workdir: &Path, name: &str) -> Result<PathBuf> {
    let path = workdir.join(name);
    if !path.is_file() {
        return Err(anyhow!(
            "dataset `{}` not found in {}; upload it or place it there",
            name,
            workdir.display()
        ));
    }
    debug!(path = %path.display(), "using existing dataset");
    Ok(path)
}

/// Regular files directly inside `workdir`, sorted by name.
pub fn list_files(workdir: &Path) -> Result<Vec<FileEntry>> {
    let entries =
        fs::read_dir(workdir).with_context(|| format!("read dir {}", workdir.display()))?;
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        files.push(FileEntry {
            name,
            size: meta.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Resolve a script-supplied path against the working directory.
///
/// Absolute paths are used as-is; the process working directory is never
/// consulted.
pub fn resolve(workdir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workdir.join(candidate)
    }
}

/// File name safe to serve from the working directory (no separators or `..`).
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_script_reports_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_script(&temp.path().join("notebook_code.rhai")).unwrap_err();
        assert!(err.to_string().contains("script not found"));
    }

    #[test]
    fn place_then_ensure_dataset() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(ensure_dataset(temp.path(), "data.csv").is_err());
        place_dataset(temp.path(), "data.csv", b"a,b\n1,2\n").expect("place");
        let path = ensure_dataset(temp.path(), "data.csv").expect("ensure");
        assert_eq!(fs::read(path).expect("read"), b"a,b\n1,2\n");
    }

    #[test]
    fn list_files_skips_directories_and_sorts() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("b.txt"), b"12").expect("write");
        fs::write(temp.path().join("a.png"), b"1").expect("write");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");

        let files = list_files(temp.path()).expect("list");
        assert_eq!(
            files,
            vec![
                FileEntry {
                    name: "a.png".to_string(),
                    size: 1
                },
                FileEntry {
                    name: "b.txt".to_string(),
                    size: 2
                },
            ]
        );
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let workdir = Path::new("/work");
        assert_eq!(resolve(workdir, "out.png"), PathBuf::from("/work/out.png"));
        assert_eq!(resolve(workdir, "/tmp/x.png"), PathBuf::from("/tmp/x.png"));
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("plot.png"));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a/b.png"));
    }
}
