//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize** | Lanczos3 via `image::DynamicImage::resize` |
//! | **Encode → AVIF** | rav1e through `image::codecs::avif` |
//! | **Encode → WebP** | lossless `image::codecs::webp` |
//! | **Encode → JPEG / PNG** | `image::codecs::{jpeg, png}` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for width selection and scaling (unit testable)
//! - **Parameters**: Data structures describing encode jobs
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedVariant, ImageBackend};
pub use calculations::{calculate_target_widths, scale_to_width};
pub use operations::{ResponsiveConfig, create_derivatives, get_dimensions, plan_variants};
pub use params::{Encoding, Quality, VariantParams, VariantTarget};
pub use rust_backend::RustBackend;
