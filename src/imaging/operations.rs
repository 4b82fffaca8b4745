//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, EncodedVariant, ImageBackend};
use super::calculations::{calculate_target_widths, scale_to_width};
use super::params::{Encoding, VariantParams, VariantTarget};
use crate::config::{PipelineConfig, QualityConfig};
use crate::naming::{Format, derivative_rel_path, formats_for};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Configuration for derivative generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    pub widths: Vec<u32>,
    pub quality: QualityConfig,
}

impl ResponsiveConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            widths: config.images.widths.clone(),
            quality: config.quality.clone(),
        }
    }
}

/// Plan every derivative for one source without executing anything.
///
/// Widths come from [`calculate_target_widths`]; for each width the plan
/// holds one target per format in tier order (AVIF, WebP, fallback). Output
/// paths follow the naming contract under `output_root`.
pub fn plan_variants(
    source: &Path,
    output_root: &Path,
    key: &str,
    original_dims: (u32, u32),
    fallback: Format,
    config: &ResponsiveConfig,
) -> VariantParams {
    let widths = calculate_target_widths(original_dims.0, &config.widths);
    let mut targets = Vec::with_capacity(widths.len() * 3);

    for width in widths {
        let (out_w, out_h) = scale_to_width(original_dims, width);
        for format in formats_for(fallback) {
            targets.push(VariantTarget {
                output: output_root.join(derivative_rel_path(key, width, format)),
                width: out_w,
                height: out_h,
                encoding: Encoding::for_format(format, &config.quality),
            });
        }
    }

    VariantParams {
        source: source.to_path_buf(),
        targets,
    }
}

/// Create every derivative for one source.
pub fn create_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    output_root: &Path,
    key: &str,
    original_dims: (u32, u32),
    fallback: Format,
    config: &ResponsiveConfig,
) -> Result<Vec<EncodedVariant>> {
    let params = plan_variants(source, output_root, key, original_dims, fallback, config);
    backend.encode_variants(&params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn config(widths: &[u32]) -> ResponsiveConfig {
        ResponsiveConfig {
            widths: widths.to_vec(),
            quality: QualityConfig::default(),
        }
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(&[("test.jpg", 1920, 1080)]);

        let dims = get_dimensions(&backend, Path::new("/test.jpg")).unwrap();
        assert_eq!(dims, (1920, 1080));
    }

    #[test]
    fn plan_wide_png_yields_twelve_targets() {
        let params = plan_variants(
            Path::new("/public/projects/skynest/skynest1.png"),
            Path::new("/public/optimized"),
            "projects/skynest/skynest1",
            (2000, 1500),
            Format::Png,
            &config(&[320, 640, 960, 1600]),
        );

        assert_eq!(params.targets.len(), 12);
        let outputs: Vec<String> = params
            .targets
            .iter()
            .map(|t| t.output.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            &outputs[..3],
            &[
                "/public/optimized/projects/skynest/skynest1-w320.avif",
                "/public/optimized/projects/skynest/skynest1-w320.webp",
                "/public/optimized/projects/skynest/skynest1-w320.png",
            ]
        );
        assert!(outputs.iter().all(|o| !o.ends_with(".jpg")));
    }

    #[test]
    fn plan_narrow_source_drops_upscaled_widths() {
        let params = plan_variants(
            Path::new("/src/a.jpg"),
            Path::new("/out"),
            "a",
            (400, 300),
            Format::Jpeg,
            &config(&[320, 640, 960, 1600]),
        );

        assert_eq!(params.targets.len(), 3);
        assert!(params.targets.iter().all(|t| t.width == 320 && t.height == 240));
        assert_eq!(params.targets[2].output, Path::new("/out/a-w320.jpg"));
    }

    #[test]
    fn plan_tiny_source_uses_native_width() {
        let params = plan_variants(
            Path::new("/src/icon.png"),
            Path::new("/out"),
            "icon",
            (200, 100),
            Format::Png,
            &config(&[320, 640]),
        );

        assert_eq!(params.targets.len(), 3);
        assert!(params.targets.iter().all(|t| (t.width, t.height) == (200, 100)));
        assert_eq!(params.targets[0].output, Path::new("/out/icon-w200.avif"));
    }

    #[test]
    fn plan_uses_configured_encoders() {
        let mut cfg = config(&[320]);
        cfg.quality.jpeg = 60;
        let params = plan_variants(
            Path::new("/src/a.jpg"),
            Path::new("/out"),
            "a",
            (1000, 800),
            Format::Jpeg,
            &cfg,
        );
        assert!(matches!(
            params.targets[2].encoding,
            Encoding::Jpeg { quality } if quality.value() == 60
        ));
        assert_eq!(params.targets[1].encoding, Encoding::WebP);
    }

    #[test]
    fn create_derivatives_runs_every_target() {
        let backend = MockBackend::new();
        let written = create_derivatives(
            &backend,
            Path::new("/src/a.jpg"),
            Path::new("/out"),
            "a",
            (1000, 750),
            Format::Jpeg,
            &config(&[320, 640, 960, 1600]),
        )
        .unwrap();

        // 320, 640, 960 fit; 1600 would upscale
        assert_eq!(written.len(), 9);
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 9);
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode { format: Format::Avif, width: 320, .. }
        ));
        assert!(matches!(
            &ops[8],
            RecordedOp::Encode { format: Format::Jpeg, width: 960, height: 720, .. }
        ));
    }
}
