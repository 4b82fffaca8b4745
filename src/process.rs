//! The derivative generator.
//!
//! Scans the source tree and, for every eligible image, writes a full
//! width × format matrix of derivatives under the output root. Sources are
//! never modified.
//!
//! ## Per-file pipeline
//!
//! ```text
//! size < min_bytes ──► skipped
//!        │
//!   identify (width)
//!        │
//!   target widths = widths ≤ native, or [native]
//!        │
//!   for each width: AVIF, WebP, fallback (PNG for PNG, JPEG otherwise)
//!        │
//!   processed ─── any error ──► failed (logged, batch continues)
//! ```
//!
//! ## Output Structure
//!
//! ```text
//! public/optimized/
//! └── images/projects/skynest/
//!     ├── skynest1-w320.avif
//!     ├── skynest1-w320.webp
//!     ├── skynest1-w320.png
//!     ├── skynest1-w640.avif
//!     └── ...
//! ```
//!
//! ## Failure model
//!
//! Setup problems (missing source root, output root that cannot be created)
//! are returned as [`ProcessError`]. Anything that goes wrong with a single
//! file becomes a [`FileOutcome::Failed`] entry in the [`RunSummary`] and
//! never stops the batch.
//!
//! ## Parallel Processing
//!
//! Files are processed on the global [rayon](https://docs.rs/rayon) pool,
//! sized by `processing.max_processes`. Each worker turns its [`FileReport`]
//! into a one-file [`RunSummary`] and rayon reduces them pairwise with
//! [`RunSummary::merge`]. No counter is shared between workers, and the
//! reduction keeps scan order in `files`.

use crate::config::PipelineConfig;
use crate::imaging::{
    BackendError, EncodedVariant, ImageBackend, ResponsiveConfig, RustBackend,
    create_derivatives, get_dimensions,
};
use crate::naming::{Format, fallback_format};
use crate::scan::{self, ScanError, SourceImage};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Cannot create output root {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One derivative as recorded in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivativeRecord {
    /// Path relative to the output root.
    pub path: String,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Processed {
        width: u32,
        height: u32,
        derivatives: Vec<DerivativeRecord>,
    },
    /// Below the `min_bytes` threshold.
    Skipped,
    Failed {
        reason: String,
    },
}

/// Result for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub key: String,
    /// Path relative to the source root.
    pub source: PathBuf,
    /// Source size in bytes.
    pub bytes: u64,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    /// Bytes saved by serving the widest fallback derivative instead of the
    /// original. Zero for anything but a processed file, and never negative.
    pub fn bytes_saved(&self) -> u64 {
        match &self.outcome {
            FileOutcome::Processed { derivatives, .. } => {
                let fallback = fallback_format(
                    self.source
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or(""),
                );
                derivatives
                    .iter()
                    .filter(|d| d.format == fallback)
                    .max_by_key(|d| d.width)
                    .map(|d| self.bytes.saturating_sub(d.bytes))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }
}

/// A file that could not be optimized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub key: String,
    pub source: PathBuf,
    pub reason: String,
}

/// Aggregate result of one generator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Derivative files written.
    pub derivatives: usize,
    /// Total size of processed sources.
    pub bytes_in: u64,
    /// Total size of written derivatives.
    pub bytes_out: u64,
    pub failures: Vec<FailedFile>,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    /// Summary of a single file.
    pub fn from_file(report: FileReport) -> Self {
        let mut summary = RunSummary::default();
        match &report.outcome {
            FileOutcome::Processed { derivatives, .. } => {
                summary.processed = 1;
                summary.derivatives = derivatives.len();
                summary.bytes_in = report.bytes;
                summary.bytes_out = derivatives.iter().map(|d| d.bytes).sum();
            }
            FileOutcome::Skipped => summary.skipped = 1,
            FileOutcome::Failed { reason } => {
                summary.failed = 1;
                summary.failures.push(FailedFile {
                    key: report.key.clone(),
                    source: report.source.clone(),
                    reason: reason.clone(),
                });
            }
        }
        summary.files.push(report);
        summary
    }

    /// Combine two summaries; `other`'s files come after `self`'s.
    pub fn merge(mut self, other: RunSummary) -> Self {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.derivatives += other.derivatives;
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
        self.failures.extend(other.failures);
        self.files.extend(other.files);
        self
    }

    /// Sum of [`FileReport::bytes_saved`] over every file.
    pub fn bytes_saved(&self) -> u64 {
        self.files.iter().map(FileReport::bytes_saved).sum()
    }
}

impl FromIterator<FileReport> for RunSummary {
    fn from_iter<I: IntoIterator<Item = FileReport>>(iter: I) -> Self {
        iter.into_iter()
            .map(RunSummary::from_file)
            .fold(RunSummary::default(), RunSummary::merge)
    }
}

/// Progress events, sent while the run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Scanned {
        sources: usize,
    },
    FileProcessed {
        key: String,
        derivatives: usize,
        bytes_in: u64,
        bytes_out: u64,
    },
    FileSkipped {
        key: String,
        bytes: u64,
    },
    FileFailed {
        key: String,
        reason: String,
    },
}

impl From<&FileReport> for ProcessEvent {
    fn from(report: &FileReport) -> Self {
        let key = report.key.clone();
        match &report.outcome {
            FileOutcome::Processed { derivatives, .. } => ProcessEvent::FileProcessed {
                key,
                derivatives: derivatives.len(),
                bytes_in: report.bytes,
                bytes_out: derivatives.iter().map(|d| d.bytes).sum(),
            },
            FileOutcome::Skipped => ProcessEvent::FileSkipped {
                key,
                bytes: report.bytes,
            },
            FileOutcome::Failed { reason } => ProcessEvent::FileFailed {
                key,
                reason: reason.clone(),
            },
        }
    }
}

/// Run the generator with the production backend.
pub fn process(
    config: &PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    let backend = RustBackend::with_timeout(config.processing.file_timeout());
    process_with_backend(&backend, config, events)
}

/// Run the generator with a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    let sources = scan::scan(&config.source, &config.output, &config.include)?;
    std::fs::create_dir_all(&config.output).map_err(|source| ProcessError::OutputRoot {
        path: config.output.clone(),
        source,
    })?;
    info!(
        sources = sources.len(),
        source_root = %config.source.display(),
        output_root = %config.output.display(),
        "scan complete"
    );
    if let Some(tx) = &events {
        let _ = tx.send(ProcessEvent::Scanned {
            sources: sources.len(),
        });
    }

    let responsive = ResponsiveConfig::from_pipeline(config);
    let summary = sources
        .par_iter()
        .map(|source| {
            let report = process_file(
                backend,
                source,
                &config.output,
                config.images.min_bytes,
                &responsive,
            );
            if let Some(tx) = &events {
                let _ = tx.send(ProcessEvent::from(&report));
            }
            RunSummary::from_file(report)
        })
        .reduce(RunSummary::default, RunSummary::merge);

    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        bytes_saved = summary.bytes_saved(),
        "run complete"
    );
    Ok(summary)
}

/// Process one source. Never fails: errors become [`FileOutcome::Failed`].
pub fn process_file(
    backend: &impl ImageBackend,
    source: &SourceImage,
    output_root: &Path,
    min_bytes: u64,
    config: &ResponsiveConfig,
) -> FileReport {
    let outcome = if source.bytes < min_bytes {
        debug!(key = %source.key, bytes = source.bytes, min_bytes, "below threshold, skipping");
        FileOutcome::Skipped
    } else {
        match generate(backend, source, output_root, config) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(path = %source.path.display(), error = %e, "failed to optimize");
                FileOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    };

    FileReport {
        key: source.key.clone(),
        source: source.relative_path.clone(),
        bytes: source.bytes,
        outcome,
    }
}

fn generate(
    backend: &impl ImageBackend,
    source: &SourceImage,
    output_root: &Path,
    config: &ResponsiveConfig,
) -> Result<FileOutcome, BackendError> {
    let (width, height) = get_dimensions(backend, &source.path)?;
    if width == 0 || height == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "image has zero size ({width}x{height})"
        )));
    }
    let fallback = fallback_format(source.extension());
    let written = create_derivatives(
        backend,
        &source.path,
        output_root,
        &source.key,
        (width, height),
        fallback,
        config,
    )?;
    debug!(key = %source.key, derivatives = written.len(), "optimized");

    Ok(FileOutcome::Processed {
        width,
        height,
        derivatives: written
            .iter()
            .map(|v| record(v, output_root))
            .collect(),
    })
}

fn record(variant: &EncodedVariant, output_root: &Path) -> DerivativeRecord {
    let rel = variant
        .output
        .strip_prefix(output_root)
        .unwrap_or(&variant.output);
    DerivativeRecord {
        path: rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        format: variant.format,
        width: variant.width,
        height: variant.height,
        bytes: variant.bytes,
    }
}
