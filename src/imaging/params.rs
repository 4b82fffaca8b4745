//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which derivatives to create) and the
//! [`backend`](super::backend) (which does the pixel work). This separation
//! allows swapping backends (e.g. for testing with a mock) without changing
//! operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`Encoding`]: Target format plus its fixed encoder settings.
//! - [`VariantTarget`]: One output file: path, dimensions, encoding.
//! - [`VariantParams`]: A source plus every target to produce from one decode.

use crate::config::QualityConfig;
use crate::naming::Format;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Encoder choice and its settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Avif { quality: Quality, speed: u8 },
    /// Lossless; the pure-Rust encoder has no lossy mode.
    WebP,
    Jpeg { quality: Quality },
    /// zlib-style level, 0-9.
    Png { compression: u8 },
}

impl Encoding {
    /// Encoder settings for `format` taken from the run's quality config.
    pub fn for_format(format: Format, quality: &QualityConfig) -> Self {
        match format {
            Format::Avif => Encoding::Avif {
                quality: Quality::new(quality.avif),
                speed: quality.avif_speed.clamp(1, 10),
            },
            Format::WebP => Encoding::WebP,
            Format::Jpeg => Encoding::Jpeg {
                quality: Quality::new(quality.jpeg),
            },
            Format::Png => Encoding::Png {
                compression: quality.png_compression.min(9),
            },
        }
    }

    pub fn format(self) -> Format {
        match self {
            Encoding::Avif { .. } => Format::Avif,
            Encoding::WebP => Format::WebP,
            Encoding::Jpeg { .. } => Format::Jpeg,
            Encoding::Png { .. } => Format::Png,
        }
    }
}

/// One derivative to write.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTarget {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
}

/// Every derivative to produce from one decoded source.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantParams {
    pub source: PathBuf,
    pub targets: Vec<VariantTarget>,
}
