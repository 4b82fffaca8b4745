//! The derivative naming contract.
//!
//! Every file the generator writes and every URL the resolver hands to a
//! browser is built by the functions in this module. The two sides never
//! check each other at runtime: if they disagreed, the browser would request
//! a missing file and silently fall back to the unoptimized original. Keeping
//! the template in one place is the only thing that prevents that drift.
//!
//! ## Template
//!
//! ```text
//! {output_root}/{logical_key}-w{width}.{ext}
//! ```
//!
//! - `logical_key` is the source path relative to the asset root, with
//!   forward slashes and the extension stripped:
//!   `images/projects/skynest/skynest1.png` → `images/projects/skynest/skynest1`
//! - `ext` is one of `avif`, `webp`, and the fallback extension (`png` for PNG
//!   sources, `jpg` for everything else).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Default candidate widths, shared by the generator and the resolver.
pub const DEFAULT_WIDTHS: [u32; 4] = [320, 640, 960, 1600];

/// Output formats, in the order they are offered to a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Next-gen tier.
    Avif,
    /// Mid-gen tier.
    WebP,
    /// Fallback tier for non-PNG sources.
    Jpeg,
    /// Fallback tier for PNG sources.
    Png,
}

impl Format {
    /// File extension used in derivative paths.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Avif => "avif",
            Format::WebP => "webp",
            Format::Jpeg => "jpg",
            Format::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Avif => "image/avif",
            Format::WebP => "image/webp",
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Pick the fallback format for a source extension.
///
/// PNG stays PNG (keeps transparency); anything else, including an empty or
/// unknown extension, falls back to JPEG.
pub fn fallback_format(ext: &str) -> Format {
    if ext.eq_ignore_ascii_case("png") {
        Format::Png
    } else {
        Format::Jpeg
    }
}

/// The three formats emitted for one source: next-gen, mid-gen, fallback.
pub fn formats_for(fallback: Format) -> [Format; 3] {
    [Format::Avif, Format::WebP, fallback]
}

/// Compute the logical key of a source from its path relative to the asset root.
///
/// Returns `None` if the path has no file stem, escapes the root (`..`), is
/// absolute, or is not valid UTF-8.
pub fn logical_key(relative_path: &Path) -> Option<String> {
    let stem = relative_path.file_stem()?.to_str()?;
    let mut parts = Vec::new();
    if let Some(parent) = relative_path.parent() {
        for component in parent.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
    }
    parts.push(stem);
    Some(parts.join("/"))
}

/// Strip the extension from the last segment of a URL path.
///
/// Mirrors [`logical_key`] for strings that arrive as URLs rather than
/// filesystem paths. Dots in directory names are preserved.
pub fn strip_extension(path: &str) -> &str {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..segment_start + dot],
        _ => path,
    }
}

/// Extension of the last segment of a URL path, lowercased. Empty if none.
pub fn url_extension(path: &str) -> String {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) => path[segment_start + dot + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// File name of one derivative: `{stem}-w{width}.{ext}`.
pub fn derivative_file_name(stem: &str, width: u32, format: Format) -> String {
    format!("{}-w{}.{}", stem, width, format.extension())
}

/// Path of one derivative relative to the output root: `{key}-w{width}.{ext}`.
pub fn derivative_rel_path(key: &str, width: u32, format: Format) -> String {
    derivative_file_name(key, width, format)
}
