//! # imgset
//!
//! Responsive image derivatives for static sites. A build-time generator
//! writes every source image as a matrix of widths × formats, and a runtime
//! resolver turns the path written in markup into `<picture>` candidates
//! pointing at those files.
//!
//! # Architecture: Two Halves, One Contract
//!
//! ```text
//! public/images/a.png ──► generator ──► public/optimized/images/a-w320.avif
//!                                                           a-w320.webp
//!                                                           a-w320.png
//!                                                           a-w640.avif ...
//!
//! "/images/a.png" ──► resolver ──► /optimized/images/a-w320.avif 320w, ...
//! ```
//!
//! The two halves never talk to each other. They agree only through the
//! naming contract in [`naming`]: `{logical key}-w{width}.{ext}` under the
//! output root on disk, and under `url_prefix` on the web. The [`verify`]
//! module checks the agreement offline.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | The path contract: formats, logical keys, derivative file names |
//! | [`config`] | `imgset.toml` loading, merging over stock defaults, validation |
//! | [`scan`] | Walks the source root for JPEG/PNG files, skipping the output root |
//! | [`imaging`] | Pure-Rust decode, resize, and AVIF/WebP/JPEG/PNG encode |
//! | [`process`] | The generator: size gate, width selection, parallel encode, run summary |
//! | [`resolve`] | The resolver: markup path → per-format `srcset` candidates |
//! | [`picture`] | `<picture>` markup for a resolved image, rendered with Maud |
//! | [`verify`] | Checks that every URL the resolver emits has a file behind it |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Derivatives Beside, Never Instead Of
//!
//! Sources are read-only. Every run writes a fresh derivative set under the
//! output root, so re-running is always safe and deleting the output root
//! is a complete reset.
//!
//! ## Per-File Failure Isolation
//!
//! A corrupt or truncated image fails that file only. It is logged, counted,
//! and listed in the run summary; the batch carries on and the process exits
//! successfully. Only setup problems (missing source root, unwritable output
//! root, bad config) abort a run.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling) and
//! `rav1e` through it for AVIF. No system libraries, so the binary runs the
//! same on every CI image.
//!
//! ## A Resolver That Cannot Fail
//!
//! Page rendering must never break over an image path. [`resolve::Resolver::resolve`]
//! returns a usable `src` for any input; remote, `data:` and relative inputs
//! pass through untouched. [`resolve::Resolver::resolve_strict`] is there for
//! callers that would rather see the error.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod picture;
pub mod process;
pub mod resolve;
pub mod scan;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;
