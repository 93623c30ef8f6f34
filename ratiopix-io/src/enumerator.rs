//! Recursive discovery of input files.

use ratiopix_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists every file under `root` whose name ends with `suffix`, sorted.
///
/// Paths are absolute. An empty `root` yields an empty list. Entries under
/// `exclude` (typically an output folder nested in the source folder) are
/// skipped. Unreadable subdirectories are logged and skipped.
///
/// # Errors
/// Returns a filesystem error if `root` does not exist, is not a directory
/// or cannot be read.
pub fn find_files(root: &Path, suffix: &str, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    if root.as_os_str().is_empty() {
        return Ok(Vec::new());
    }
    let root = std::fs::canonicalize(root).map_err(|e| Error::filesystem(root, e))?;
    if !root.is_dir() {
        return Err(Error::filesystem(&root, "not a directory"));
    }
    std::fs::read_dir(&root).map_err(|e| Error::filesystem(&root, e))?;

    let exclude = exclude.and_then(|dir| std::fs::canonicalize(dir).ok());

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| exclude.as_deref() != Some(entry.path()));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    log::debug!("Found {} file(s) ending in '{suffix}' under {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_recursive_sorted_suffix_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.nd2"));
        touch(&dir.path().join("a/z.nd2"));
        touch(&dir.path().join("a/notes.txt"));
        touch(&dir.path().join("c.nd2.bak"));

        let files = find_files(dir.path(), "nd2", None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(fs::canonicalize(dir.path()).unwrap()).unwrap())
            .map(Path::to_path_buf)
            .collect();
        assert_eq!(names, vec![PathBuf::from("a/z.nd2"), PathBuf::from("b.nd2")]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_exclude_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cells.tif"));
        touch(&dir.path().join("out/cells_ratio.tif"));

        let files = find_files(dir.path(), ".tif", Some(&dir.path().join("out"))).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("cells.tif"));
    }

    #[test]
    fn test_empty_root_and_missing_root() {
        assert!(find_files(Path::new(""), "nd2", None).unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let err = find_files(&dir.path().join("missing"), "nd2", None).unwrap_err();
        assert!(err.is_file_fatal());
    }

    #[test]
    fn test_root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.nd2");
        touch(&file);
        assert!(find_files(&file, "nd2", None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_link_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.nd2"));
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("b.nd2")).unwrap();

        let files = find_files(dir.path(), "nd2", None).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.nd2"));
    }
}
