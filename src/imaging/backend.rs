//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the codec capability the generator needs:
//! probe dimensions, then decode once and write a batch of resized,
//! re-encoded variants.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, statically
//! linked into the binary.

use super::params::VariantParams;
use crate::naming::Format;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Timed out after {0}s")]
    TimedOut(u64),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One variant written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVariant {
    pub output: PathBuf,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    /// Size of the written file.
    pub bytes: u64,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: the generator shares one backend across
/// its worker pool.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode where the codec allows it.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `params.source` once and write every target.
    ///
    /// Targets are written in order. The first failure aborts the remaining
    /// targets for this source and is returned.
    fn encode_variants(&self, params: &VariantParams) -> Result<Vec<EncodedVariant>, BackendError>;
}
