//! CLI output formatting for every command.
//!
//! Output is **key-centric**: each line leads with the image's logical key
//! (`images/projects/skynest/skynest1`), the same string that appears in
//! derivative paths and resolver URLs, so a line on the terminal can be
//! traced straight to files on disk.
//!
//! # Output Format
//!
//! ## Optimize
//!
//! ```text
//! Found 3 source images
//! optimized images/projects/skynest/skynest1 (12 derivatives, 512.0 KB -> 301.2 KB)
//! skipped   images/icon (4.1 KB)
//! failed    images/broken: Processing failed: Failed to decode ...
//!
//! done. processed: 1, skipped: 1, failed: 1, derivatives: 12, bytes_saved: 224419
//! ```
//!
//! ## Check
//!
//! ```text
//! process images/projects/skynest/skynest1.png (512.0 KB)
//! skip    images/icon.png (4.1 KB)
//!
//! 1 to process, 1 to skip (threshold 100.0 KB)
//! ```
//!
//! ## Verify
//!
//! ```text
//! missing images/a: /optimized/images/a-w640.avif
//!     expected at public/optimized/images/a-w640.avif
//!
//! checked: 2, skipped: 1, present: 17, missing: 1, unreadable: 0
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::process::{ProcessEvent, RunSummary};
use crate::scan::SourceImage;
use crate::verify::VerifyReport;

/// Human-readable byte count, 1024-based.
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

// ============================================================================
// Optimize
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Scanned { sources } => vec![format!("Found {} source images", sources)],
        ProcessEvent::FileProcessed {
            key,
            derivatives,
            bytes_in,
            bytes_out,
        } => vec![format!(
            "optimized {} ({} derivatives, {} -> {})",
            key,
            derivatives,
            human_bytes(*bytes_in),
            human_bytes(*bytes_out)
        )],
        ProcessEvent::FileSkipped { key, bytes } => {
            vec![format!("skipped   {} ({})", key, human_bytes(*bytes))]
        }
        ProcessEvent::FileFailed { key, reason } => vec![format!("failed    {}: {}", key, reason)],
    }
}

/// Format the end-of-run summary. The last line is stable and greppable.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if !summary.failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} file(s) failed:", summary.failures.len()));
        for failure in &summary.failures {
            lines.push(format!("    {}: {}", failure.source.display(), failure.reason));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "done. processed: {}, skipped: {}, failed: {}, derivatives: {}, bytes_saved: {}",
        summary.processed,
        summary.skipped,
        summary.failed,
        summary.derivatives,
        summary.bytes_saved()
    ));
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the dry-run listing: which sources would be processed or skipped.
pub fn format_check_output(sources: &[SourceImage], min_bytes: u64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut to_process = 0;
    for source in sources {
        let action = if source.bytes < min_bytes {
            "skip   "
        } else {
            to_process += 1;
            "process"
        };
        lines.push(format!(
            "{} {} ({})",
            action,
            source.url_path().trim_start_matches('/'),
            human_bytes(source.bytes)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} to process, {} to skip (threshold {})",
        to_process,
        sources.len() - to_process,
        human_bytes(min_bytes)
    ));
    lines
}

pub fn print_check_output(sources: &[SourceImage], min_bytes: u64) {
    for line in format_check_output(sources, min_bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// Verify
// ============================================================================

/// Format a verify report: missing derivatives first, then the totals line.
pub fn format_verify_report(report: &VerifyReport) -> Vec<String> {
    let mut lines = Vec::new();
    for missing in &report.missing {
        lines.push(format!("missing {}: {}", missing.key, missing.url));
        match &missing.path {
            Some(path) => lines.push(format!("    expected at {}", path.display())),
            None => lines.push("    URL does not map under the output root".to_string()),
        }
    }
    for unreadable in &report.unreadable {
        lines.push(format!("unreadable {}: {}", unreadable.key, unreadable.reason));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "checked: {}, skipped: {}, present: {}, missing: {}, unreadable: {}",
        report.checked,
        report.skipped,
        report.present,
        report.missing.len(),
        report.unreadable.len()
    ));
    lines
}

pub fn print_verify_report(report: &VerifyReport) {
    for line in format_verify_report(report) {
        println!("{}", line);
    }
}
