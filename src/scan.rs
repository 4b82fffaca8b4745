//! Source discovery.
//!
//! Walks the asset root and returns every JPEG/PNG file the generator should
//! consider, each tagged with its logical key.
//!
//! ## Rules
//!
//! - Only `.jpg`, `.jpeg`, and `.png` files (case-insensitive) are sources.
//! - The output root is never walked, even when it lives inside the source
//!   root, so a second run does not re-process its own derivatives.
//! - Hidden entries (`.git`, `.DS_Store`, ...) are ignored.
//! - Results are sorted by path, so runs are reproducible.
//! - `include` narrows the scan to listed directories or single files inside
//!   the root. A missing entry is logged and skipped; a missing root is fatal.

use crate::naming::logical_key;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source root not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Include path escapes the source root: {0}")]
    IncludeOutsideRoot(PathBuf),
}

/// Codec family of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Jpeg,
    Png,
}

impl SourceKind {
    /// Classify a file by extension. `None` for anything outside the whitelist.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("png") {
            Some(SourceKind::Png)
        } else if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Some(SourceKind::Jpeg)
        } else {
            None
        }
    }
}

/// One image found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceImage {
    /// Path on disk (source root joined with `relative_path`).
    pub path: PathBuf,
    /// Path relative to the source root.
    pub relative_path: PathBuf,
    /// Logical key: `relative_path` without extension, `/`-separated.
    pub key: String,
    /// File size in bytes at scan time.
    pub bytes: u64,
    pub kind: SourceKind,
}

impl SourceImage {
    /// Extension as written on disk, used to pick the fallback format.
    pub fn extension(&self) -> &str {
        self.relative_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }

    /// Root-relative URL of the original file, e.g. `/images/a.png`.
    pub fn url_path(&self) -> String {
        let rel = self
            .relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{rel}")
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Scan `source_root` for images, skipping `output_root`.
///
/// `include` entries are relative to `source_root`; an empty slice scans the
/// whole root.
pub fn scan(
    source_root: &Path,
    output_root: &Path,
    include: &[PathBuf],
) -> Result<Vec<SourceImage>, ScanError> {
    if !source_root.is_dir() {
        return Err(ScanError::SourceNotFound(source_root.to_path_buf()));
    }
    let root = source_root.canonicalize()?;
    // The output root may not exist yet; in that case it holds nothing to skip.
    let output = output_root.canonicalize().ok();

    let starts: Vec<PathBuf> = if include.is_empty() {
        vec![root.clone()]
    } else {
        let mut starts = Vec::new();
        for entry in include {
            if entry.is_absolute()
                || entry
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(ScanError::IncludeOutsideRoot(entry.clone()));
            }
            let path = root.join(entry);
            if path.exists() {
                starts.push(path);
            } else {
                warn!(path = %path.display(), "include path not found, skipping");
            }
        }
        starts
    };

    let mut images = Vec::new();
    for start in &starts {
        let walker = WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !is_hidden(e) && output.as_deref().is_none_or(|out| e.path() != out)
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(image) = source_image(&root, entry.path()) {
                images.push(image);
            }
        }
    }

    images.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    images.dedup_by(|a, b| a.path == b.path);
    warn_on_key_collisions(&images);
    Ok(images)
}

/// Build a [`SourceImage`] for a file, or `None` if it is not a source.
///
/// A file that vanishes or cannot be stat'ed between listing and this call
/// is skipped with a warning; one bad entry never ends the scan.
fn source_image(root: &Path, path: &Path) -> Option<SourceImage> {
    let kind = SourceKind::from_path(path)?;
    let relative_path = path.strip_prefix(root).ok()?;
    let Some(key) = logical_key(relative_path) else {
        warn!(path = %path.display(), "no usable logical key, skipping");
        return None;
    };
    let bytes = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read file metadata, skipping");
            return None;
        }
    };
    Some(SourceImage {
        path: path.to_path_buf(),
        relative_path: relative_path.to_path_buf(),
        key,
        bytes,
        kind,
    })
}

/// `a.jpg` and `a.png` share a key, so their `avif`/`webp` derivatives land
/// on the same paths. The later source wins; say so.
fn warn_on_key_collisions(images: &[SourceImage]) {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for image in images {
        if let Some(previous) = seen.insert(image.key.as_str(), image.relative_path.as_path()) {
            warn!(
                key = %image.key,
                first = %previous.display(),
                second = %image.relative_path.display(),
                "sources share a logical key; derivatives will overwrite each other"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_sized;
    use tempfile::TempDir;

    fn keys(images: &[SourceImage]) -> Vec<&str> {
        images.iter().map(|i| i.key.as_str()).collect()
    }

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(SourceKind::from_path(Path::new("a.JPG")), Some(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_path(Path::new("a.jpeg")), Some(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_path(Path::new("a.Png")), Some(SourceKind::Png));
        assert_eq!(SourceKind::from_path(Path::new("a.gif")), None);
        assert_eq!(SourceKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn scan_finds_nested_images_sorted() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("images/projects/skynest/skynest1.png"), 10);
        write_sized(&root.join("images/b.jpg"), 10);
        write_sized(&root.join("ifaz.jpeg"), 10);
        write_sized(&root.join("notes.txt"), 10);
        write_sized(&root.join("anim.gif"), 10);

        let images = scan(&root, &root.join("optimized"), &[]).unwrap();

        assert_eq!(
            keys(&images),
            vec!["ifaz", "images/b", "images/projects/skynest/skynest1"]
        );
        let sky = &images[2];
        assert_eq!(sky.kind, SourceKind::Png);
        assert_eq!(sky.bytes, 10);
        assert_eq!(sky.extension(), "png");
        assert_eq!(sky.url_path(), "/images/projects/skynest/skynest1.png");
    }

    #[test]
    fn scan_skips_nested_output_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("images/a.jpg"), 10);
        write_sized(&root.join("optimized/images/a-w320.jpg"), 10);

        let images = scan(&root, &root.join("optimized"), &[]).unwrap();
        assert_eq!(keys(&images), vec!["images/a"]);
    }

    #[test]
    fn scan_tolerates_missing_output_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("a.png"), 10);

        let images = scan(&root, &tmp.path().join("nowhere"), &[]).unwrap();
        assert_eq!(keys(&images), vec!["a"]);
    }

    #[test]
    fn scan_ignores_hidden_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join(".cache/a.jpg"), 10);
        write_sized(&root.join(".hidden.png"), 10);
        write_sized(&root.join("visible.png"), 10);

        let images = scan(&root, &root.join("optimized"), &[]).unwrap();
        assert_eq!(keys(&images), vec!["visible"]);
    }

    #[test]
    fn scan_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = scan(&tmp.path().join("missing"), &tmp.path().join("out"), &[]);
        assert!(matches!(result, Err(ScanError::SourceNotFound(_))));
    }

    #[test]
    fn scan_include_restricts_to_listed_paths() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("images/a.jpg"), 10);
        write_sized(&root.join("ifaz.jpeg"), 10);
        write_sized(&root.join("other/c.png"), 10);

        let include = vec![PathBuf::from("images"), PathBuf::from("ifaz.jpeg")];
        let images = scan(&root, &root.join("optimized"), &include).unwrap();
        assert_eq!(keys(&images), vec!["ifaz", "images/a"]);
    }

    #[test]
    fn scan_include_missing_entry_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("images/a.jpg"), 10);

        let include = vec![PathBuf::from("images"), PathBuf::from("gone")];
        let images = scan(&root, &root.join("optimized"), &include).unwrap();
        assert_eq!(keys(&images), vec!["images/a"]);
    }

    #[test]
    fn scan_include_overlap_is_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("images/a.jpg"), 10);

        let include = vec![PathBuf::from("images"), PathBuf::from("images/a.jpg")];
        let images = scan(&root, &root.join("optimized"), &include).unwrap();
        assert_eq!(keys(&images), vec!["images/a"]);
    }

    #[test]
    fn scan_include_rejects_parent_escape() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("a.jpg"), 10);

        let include = vec![PathBuf::from("../secret")];
        assert!(matches!(
            scan(&root, &root.join("optimized"), &include),
            Err(ScanError::IncludeOutsideRoot(_))
        ));
    }

    #[test]
    fn unreadable_metadata_skips_only_that_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("a.jpg"), 10);

        assert!(source_image(&root, &root.join("gone.jpg")).is_none());
        let kept = source_image(&root, &root.join("a.jpg")).unwrap();
        assert_eq!((kept.key.as_str(), kept.bytes), ("a", 10));
    }

    #[test]
    fn scan_keeps_colliding_keys() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        write_sized(&root.join("a.jpg"), 10);
        write_sized(&root.join("a.png"), 10);

        let images = scan(&root, &root.join("optimized"), &[]).unwrap();
        assert_eq!(keys(&images), vec!["a", "a"]);
    }
}
