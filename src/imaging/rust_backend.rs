//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! ## Writes
//!
//! Each derivative is encoded into memory, written next to its final path as
//! `<name>.<pid>-<seq>.partial`, then renamed into place. A crash mid-write
//! leaves a `.partial` file behind, never a truncated derivative under the
//! real name. The sequence number keeps concurrent writers of one path (two
//! sources sharing a logical key) off each other's temp files.
//!
//! ## Timeouts
//!
//! With a timeout, the work runs on its own thread. When the budget runs out
//! the caller gets [`BackendError::TimedOut`] and the worker is cancelled: it
//! stops before its next write and deletes every derivative it already wrote
//! for that source, so a timed-out file leaves nothing on disk.

use super::backend::{BackendError, Dimensions, EncodedVariant, ImageBackend};
use super::params::{Encoding, VariantParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    timeout: Option<Duration>,
}

impl RustBackend {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Bound the decode + encode work for one source.
    ///
    /// The work runs on a dedicated thread; when the budget runs out the
    /// source is reported as failed and the thread is cancelled.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Convert to 8-bit RGB(A), the common ground of every encoder we use.
fn to_8bit(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
        other if other.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
        }
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode one frame into memory.
fn encode(img: &DynamicImage, encoding: Encoding) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match encoding {
        Encoding::Avif { quality, speed } => {
            let encoder =
                AvifEncoder::new_with_speed_quality(&mut buf, speed, quality.value() as u8);
            to_8bit(img).write_with_encoder(encoder)
        }
        Encoding::WebP => to_8bit(img).write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        Encoding::Jpeg { quality } => {
            // JPEG has no alpha channel
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        Encoding::Png { compression } => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                png_compression(compression),
                PngFilter::Adaptive,
            );
            to_8bit(img).write_with_encoder(encoder)
        }
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{} encode failed: {}", encoding.format(), e))
    })?;
    Ok(buf)
}

/// Unique temp name next to `path`: `<name>.<pid>-<seq>.partial`.
fn partial_path(path: &Path) -> PathBuf {
    let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}-{}.partial", std::process::id(), seq));
    path.with_file_name(name)
}

fn discard(written: &[EncodedVariant]) {
    for variant in written {
        let _ = std::fs::remove_file(&variant.output);
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = partial_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(BackendError::Io(e));
    }
    Ok(())
}

/// Decode once, then resize and encode every target.
///
/// Targets that share dimensions (one width, several formats) reuse the same
/// resized frame. Once `cancel` is set, no further file is written and the
/// ones already written are removed.
fn encode_all(
    params: &VariantParams,
    cancel: &AtomicBool,
) -> Result<Vec<EncodedVariant>, BackendError> {
    let cancelled = || {
        BackendError::ProcessingFailed(format!(
            "encode of {} cancelled",
            params.source.display()
        ))
    };
    let img = load_image(&params.source)?;
    let native = (img.width(), img.height());
    let mut current: Option<((u32, u32), DynamicImage)> = None;
    let mut written = Vec::with_capacity(params.targets.len());

    for target in &params.targets {
        let dims = (target.width, target.height);
        if current.as_ref().is_none_or(|(d, _)| *d != dims) {
            let frame = if dims.0 >= native.0 {
                img.clone()
            } else {
                img.resize_exact(dims.0, dims.1, FilterType::Lanczos3)
            };
            current = Some((dims, frame));
        }
        let Some((_, frame)) = current.as_ref() else {
            continue;
        };

        let bytes = encode(frame, target.encoding)?;
        if cancel.load(Ordering::SeqCst) {
            discard(&written);
            return Err(cancelled());
        }
        write_atomically(&target.output, &bytes)?;
        written.push(EncodedVariant {
            output: target.output.clone(),
            format: target.encoding.format(),
            width: frame.width(),
            height: frame.height(),
            bytes: bytes.len() as u64,
        });
        // The flag may have been set during the write
        if cancel.load(Ordering::SeqCst) {
            discard(&written);
            return Err(cancelled());
        }
    }

    Ok(written)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn encode_variants(&self, params: &VariantParams) -> Result<Vec<EncodedVariant>, BackendError> {
        let Some(limit) = self.timeout else {
            return encode_all(params, &AtomicBool::new(false));
        };

        let (tx, rx) = mpsc::channel();
        let job = params.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        std::thread::Builder::new()
            .name("imgset-encode".into())
            .spawn(move || {
                let _ = tx.send(encode_all(&job, &worker_cancel));
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::SeqCst);
                Err(BackendError::TimedOut(limit.as_secs()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(BackendError::ProcessingFailed(format!(
                "encoder thread for {} exited without a result",
                params.source.display()
            ))),
        }
    }
}
