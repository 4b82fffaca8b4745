//! Offline check that the generator's output and the resolver's URLs agree.
//!
//! For every source the generator would process, the resolver builds the
//! candidate URLs for the widths the generator would write; each URL is
//! mapped back under the output root and checked on disk. A missing file is
//! a broken `<source>` in production.
//!
//! Sources below `min_bytes` are counted but not checked: the generator
//! never writes derivatives for them.

use crate::config::PipelineConfig;
use crate::imaging::{ImageBackend, RustBackend, calculate_target_widths, get_dimensions};
use crate::resolve::{Resolved, Resolver};
use crate::scan::{self, ScanError, SourceImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A candidate URL with no file behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDerivative {
    pub key: String,
    pub url: String,
    /// Where the file was expected. `None` if the URL does not map under
    /// the output root at all.
    pub path: Option<PathBuf>,
}

/// A source whose dimensions could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableSource {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Sources whose derivatives were checked.
    pub checked: usize,
    /// Sources below the size threshold.
    pub skipped: usize,
    /// Derivative files found.
    pub present: usize,
    pub missing: Vec<MissingDerivative>,
    pub unreadable: Vec<UnreadableSource>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn verify(config: &PipelineConfig) -> Result<VerifyReport, ScanError> {
    verify_with_backend(&RustBackend::new(), config)
}

/// Verify using `backend` to read source dimensions.
pub fn verify_with_backend(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
) -> Result<VerifyReport, ScanError> {
    let sources = scan::scan(&config.source, &config.output, &config.include)?;
    let resolver = Resolver::new(config.resolver_config());
    let mut report = VerifyReport::default();

    for source in &sources {
        if source.bytes < config.images.min_bytes {
            report.skipped += 1;
            continue;
        }
        let (width, _) = match get_dimensions(backend, &source.path) {
            Ok(dims) => dims,
            Err(e) => {
                warn!(path = %source.path.display(), error = %e, "cannot read source");
                report.unreadable.push(UnreadableSource {
                    key: source.key.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        report.checked += 1;
        check_source(&resolver, config, source, width, &mut report);
    }

    debug!(
        checked = report.checked,
        present = report.present,
        missing = report.missing.len(),
        "verify complete"
    );
    Ok(report)
}

fn check_source(
    resolver: &Resolver,
    config: &PipelineConfig,
    source: &SourceImage,
    native_width: u32,
    report: &mut VerifyReport,
) {
    let widths = calculate_target_widths(native_width, &config.images.widths);
    let Resolved::Candidates(set) = resolver.resolve(&source.url_path(), &widths) else {
        return;
    };

    for candidate in set.sources.iter().flat_map(|s| &s.candidates) {
        match url_to_path(resolver, &config.output, &candidate.url) {
            Some(path) if path.is_file() => report.present += 1,
            path => report.missing.push(MissingDerivative {
                key: source.key.clone(),
                url: candidate.url.clone(),
                path,
            }),
        }
    }
}

/// Map a derivative URL back to a file under `output_root`.
fn url_to_path(resolver: &Resolver, output_root: &Path, url: &str) -> Option<PathBuf> {
    let config = resolver.config();
    let rest = url
        .strip_prefix(config.cdn_base.as_str())?
        .strip_prefix(config.url_prefix.as_str())?
        .strip_prefix('/')?;
    let mut path = output_root.to_path_buf();
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::process::process_with_backend;
    use crate::test_helpers::write_sized;
    use tempfile::TempDir;

    const KB: usize = 1024;

    fn test_config(tmp: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.source = tmp.join("public");
        config.output = tmp.join("public/optimized");
        config
    }

    #[test]
    fn url_to_path_maps_under_output_root() {
        let resolver = Resolver::default();
        assert_eq!(
            url_to_path(&resolver, Path::new("/out"), "/optimized/images/a-w320.png"),
            Some(PathBuf::from("/out/images/a-w320.png"))
        );
        assert_eq!(url_to_path(&resolver, Path::new("/out"), "/elsewhere/a.png"), None);
        assert_eq!(url_to_path(&resolver, Path::new("/out"), "/optimized/../a.png"), None);
    }

    #[test]
    fn empty_output_reports_every_expected_derivative() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_sized(&config.source.join("images/a.png"), 200 * KB);
        let backend = MockBackend::with_dimensions(&[("a.png", 700, 400)]);

        let report = verify_with_backend(&backend, &config).unwrap();

        assert!(!report.is_ok());
        assert_eq!(report.checked, 1);
        // 320 and 640 × avif, webp, png
        assert_eq!(report.missing.len(), 6);
        assert_eq!(report.present, 0);
        assert!(
            report
                .missing
                .iter()
                .any(|m| m.url == "/optimized/images/a-w640.png")
        );
    }

    #[test]
    fn generator_output_satisfies_verify() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_sized(&config.source.join("images/a.png"), 200 * KB);
        write_sized(&config.source.join("b.jpg"), 300 * KB);
        let backend = MockBackend::with_dimensions(&[("a.png", 700, 400), ("b.jpg", 200, 100)]);

        // The mock records outputs without writing them; create them here.
        process_with_backend(&backend, &config, None).unwrap();
        for output in backend.encoded_outputs() {
            write_sized(Path::new(&output), 10);
        }

        let report = verify_with_backend(&backend, &config).unwrap();
        assert!(report.is_ok(), "{:?}", report.missing);
        assert_eq!(report.checked, 2);
        assert_eq!(report.present, 9);
    }

    #[test]
    fn small_sources_are_not_checked() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_sized(&config.source.join("icon.png"), 2 * KB);
        let backend = MockBackend::new();

        let report = verify_with_backend(&backend, &config).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.checked, 0);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn unreadable_source_is_reported_separately() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        write_sized(&config.source.join("broken.jpg"), 200 * KB);
        let backend = MockBackend::new().failing_on("broken.jpg");

        let report = verify_with_backend(&backend, &config).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].key, "broken");
    }

    #[test]
    fn cdn_urls_still_map_back() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(tmp.path());
        config.resolver.cdn_base = "https://cdn.example.com/".to_string();
        write_sized(&config.source.join("a.jpg"), 200 * KB);
        for ext in ["avif", "webp", "jpg"] {
            write_sized(&config.output.join(format!("a-w320.{ext}")), 10);
        }
        let backend = MockBackend::with_dimensions(&[("a.jpg", 500, 300)]);

        let report = verify_with_backend(&backend, &config).unwrap();
        assert!(report.is_ok(), "{:?}", report.missing);
        assert_eq!(report.present, 3);
    }
}
