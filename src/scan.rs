//! Filesystem scan for derivative candidates.
//!
//! Lists the siblings of a source image that match `<stem>*<ext>`, the same
//! set a shell glob like `photo*.jpg` would return (source included). The
//! result is only an audit list for orphan cleanup; the metadata record,
//! not the directory, decides which derivatives are real.

use crate::naming::split_extension;
use std::io;
use std::path::{Path, PathBuf};

/// Sibling files of `source` (absolute path) named `<stem>*<ext>`, sorted.
///
/// Stem and extension are compared case-sensitively, like a POSIX glob.
/// Returns an empty list for a source without a 3–4 letter extension.
pub fn derivative_candidates(source: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(filename) = source.file_name().and_then(|f| f.to_str()) else {
        return Ok(Vec::new());
    };
    let Some((stem, ext)) = split_extension(filename) else {
        return Ok(Vec::new());
    };
    let dir = source.parent().unwrap_or(Path::new("."));

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.len() >= stem.len() + ext.len() && name.starts_with(stem) && name.ends_with(ext) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn lists_source_and_same_stem_siblings() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "photo.jpg",
            "photo-300x200.jpg",
            "photo-edited.jpg",
            "photo2.jpg",
            "photo.png",
            "other.jpg",
        ] {
            touch(tmp.path(), name);
        }

        let found = derivative_candidates(&tmp.path().join("photo.jpg")).unwrap();
        assert_eq!(
            names(&found),
            vec!["photo-300x200.jpg", "photo-edited.jpg", "photo.jpg", "photo2.jpg"]
        );
    }

    #[test]
    fn extension_case_sensitive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "photo.JPG");
        touch(tmp.path(), "photo-10x10.JPG");
        touch(tmp.path(), "photo-10x10.jpg");

        let found = derivative_candidates(&tmp.path().join("photo.JPG")).unwrap();
        assert_eq!(names(&found), vec!["photo-10x10.JPG", "photo.JPG"]);
    }

    #[test]
    fn skips_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "photo.jpg");
        fs::create_dir(tmp.path().join("photo-dir.jpg")).unwrap();

        let found = derivative_candidates(&tmp.path().join("photo.jpg")).unwrap();
        assert_eq!(names(&found), vec!["photo.jpg"]);
    }

    #[test]
    fn source_without_extension_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "README");
        assert!(derivative_candidates(&tmp.path().join("README")).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = derivative_candidates(Path::new("/nonexistent/dir/photo.jpg"));
        assert!(result.is_err());
    }
}
