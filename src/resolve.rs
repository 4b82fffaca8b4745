//! The source resolver.
//!
//! Maps an image path as written in page markup (`/images/a.png`) to the
//! derivative URLs the generator wrote for it. Resolution is pure string
//! manipulation: no filesystem access, no I/O, no failure.
//!
//! ```text
//! /images/a.png?v=2
//!   └─ strip query ──► /images/a.png
//!   └─ key ──────────► images/a
//!   └─ fallback ─────► png
//!   └─ per format ───► {cdn}/optimized/images/a-w320.avif 320w, ...
//! ```
//!
//! Inputs that cannot have derivatives (empty, `http(s)://`, `//host`,
//! `data:`, relative paths) come back as [`Resolved::PassThrough`]. Use
//! [`Resolver::resolve_strict`] to have them rejected instead.

use crate::config::ResolverConfig;
use crate::naming::{
    Format, derivative_rel_path, fallback_format, formats_for, strip_extension, url_extension,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty image path")]
    Empty,
    #[error("remote URL has no local derivatives: {0}")]
    Remote(String),
    #[error("data URI has no derivatives")]
    Data,
    #[error("path is not root-relative: {0}")]
    NotRootRelative(String),
    #[error("path has no file name: {0}")]
    NoFileName(String),
    #[error("path has no file extension: {0}")]
    NoExtension(String),
    #[error("extension .{ext} is not optimized (jpg, jpeg, png only): {path}")]
    Unsupported { path: String, ext: String },
}

/// One URL in a `srcset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub url: String,
    pub width: u32,
}

/// All widths of one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSet {
    pub format: Format,
    pub candidates: Vec<Candidate>,
}

impl SourceSet {
    /// MIME type for the `<source type>` attribute.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `srcset` attribute value: `url 320w, url 640w`.
    pub fn srcset(&self) -> String {
        self.candidates
            .iter()
            .map(|c| format!("{} {}w", c.url, c.width))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything needed to render one responsive image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    /// AVIF, WebP, then the fallback format.
    pub sources: Vec<SourceSet>,
    /// Smallest width in the fallback format.
    pub fallback_src: String,
    pub fallback_format: Format,
    /// The original path with the CDN prefix applied.
    pub original_src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolved {
    PassThrough { src: String },
    Candidates(CandidateSet),
}

impl Resolved {
    /// A URL that can always go into `<img src>`. Empty only for empty input.
    pub fn best_src(&self) -> &str {
        match self {
            Resolved::PassThrough { src } => src,
            Resolved::Candidates(set) => &set.fallback_src,
        }
    }

    pub fn candidates(&self) -> Option<&CandidateSet> {
        match self {
            Resolved::Candidates(set) => Some(set),
            Resolved::PassThrough { .. } => None,
        }
    }
}

fn is_remote(src: &str) -> bool {
    let lower = src.get(..8).unwrap_or(src).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || src.starts_with("//")
}

fn is_data(src: &str) -> bool {
    src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

fn strip_query(src: &str) -> &str {
    src.split('?').next().unwrap_or(src)
}

/// Logical key of a root-relative path, or `None` when the last segment is
/// empty (`/`, `/images/`).
fn key_of(clean: &str) -> Option<&str> {
    let key = strip_extension(clean).trim_start_matches('/');
    if key.is_empty() || key.ends_with('/') {
        None
    } else {
        Some(key)
    }
}

/// Builds derivative URLs following the shared naming contract.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Prefix a root-relative path with the CDN base. Anything else, or any
    /// path when no CDN is configured, is returned as is.
    pub fn with_cdn(&self, src: &str) -> String {
        if src.starts_with('/') && !src.starts_with("//") && !self.config.cdn_base.is_empty() {
            format!("{}{}", self.config.cdn_base, src)
        } else {
            src.to_string()
        }
    }

    /// URL of one derivative for a logical key.
    pub fn derivative_url(&self, key: &str, width: u32, format: Format) -> String {
        self.with_cdn(&format!(
            "{}/{}",
            self.config.url_prefix,
            derivative_rel_path(key, width, format)
        ))
    }

    /// Resolve an image path. Never fails.
    ///
    /// An empty `widths` slice uses the configured widths.
    pub fn resolve(&self, src: &str, widths: &[u32]) -> Resolved {
        if src.is_empty() || is_remote(src) || is_data(src) {
            return Resolved::PassThrough {
                src: src.to_string(),
            };
        }
        let clean = strip_query(src);
        match key_of(clean) {
            Some(key) if clean.starts_with('/') => {
                Resolved::Candidates(self.candidate_set(src, clean, key, widths))
            }
            _ => Resolved::PassThrough {
                src: self.with_cdn(src),
            },
        }
    }

    /// Like [`resolve`](Self::resolve), but inputs without derivatives are
    /// errors rather than pass-throughs.
    pub fn resolve_strict(&self, src: &str, widths: &[u32]) -> Result<CandidateSet, ResolveError> {
        if src.is_empty() {
            return Err(ResolveError::Empty);
        }
        if is_data(src) {
            return Err(ResolveError::Data);
        }
        if is_remote(src) {
            return Err(ResolveError::Remote(src.to_string()));
        }
        let clean = strip_query(src);
        if !clean.starts_with('/') {
            return Err(ResolveError::NotRootRelative(src.to_string()));
        }
        let Some(key) = key_of(clean) else {
            return Err(ResolveError::NoFileName(src.to_string()));
        };
        let ext = url_extension(clean);
        if ext.is_empty() {
            return Err(ResolveError::NoExtension(src.to_string()));
        }
        if !matches!(ext.as_str(), "jpg" | "jpeg" | "png") {
            return Err(ResolveError::Unsupported {
                path: src.to_string(),
                ext,
            });
        }
        Ok(self.candidate_set(src, clean, key, widths))
    }

    fn candidate_set(&self, src: &str, clean: &str, key: &str, widths: &[u32]) -> CandidateSet {
        let widths = if widths.is_empty() {
            self.config.widths.as_slice()
        } else {
            widths
        };
        let fallback = fallback_format(&url_extension(clean));

        let sources: Vec<SourceSet> = formats_for(fallback)
            .into_iter()
            .map(|format| SourceSet {
                format,
                candidates: widths
                    .iter()
                    .map(|&width| Candidate {
                        url: self.derivative_url(key, width, format),
                        width,
                    })
                    .collect(),
            })
            .collect();

        let fallback_src = match widths.iter().min() {
            Some(&width) => self.derivative_url(key, width, fallback),
            None => self.with_cdn(src),
        };

        CandidateSet {
            sources,
            fallback_src,
            fallback_format: fallback,
            original_src: self.with_cdn(src),
        }
    }
}
