//! Shared test utilities.
//!
//! Synthetic image writers and asset-tree builders used by the unit tests of
//! `scan`, `process`, `verify`, and the imaging backend.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_sized(&tmp.path().join("public/images/a.jpg"), 200 * 1024);
//! create_test_png(&tmp.path().join("public/logo.png"), 64, 32);
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid RGBA PNG file with the given dimensions.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, if x % 2 == 0 { 255 } else { 128 }])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write a file of exactly `len` bytes. Content is irrelevant: used with the
/// mock backend, which never reads the file.
pub fn write_sized(path: &Path, len: usize) {
    ensure_parent(path);
    std::fs::write(path, vec![0u8; len]).unwrap();
}

/// Relative paths of every file under `root`, forward-slash joined and sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
