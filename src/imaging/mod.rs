//! Image processing, pure Rust via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (header only) |
//! | **Resample** | `crop_imm` + `resize_exact` (Triangle) + `filter3x3` |
//! | **Encode** | GIF / JPEG (quality) / PNG, same format as the source |
//!
//! The module is split into:
//! - **Format**: [`ImageKind`], the fixed gif/jpeg/png set and their MIME types
//! - **Calculations**: Pure resize-geometry math (unit testable)
//! - **Parameters**: Data structures describing a resample
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend + disk

pub mod backend;
mod calculations;
mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, Identified, ImageBackend};
pub use calculations::{ResizeGeometry, resize_geometry};
pub use format::ImageKind;
pub use operations::{create_derivative, plan_derivative};
pub use params::{Quality, ResampleParams, Sharpening};
pub use rust_backend::RustBackend;
