//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the reconciler needs:
//! identify (dimensions + format) and resample (render derivative bytes).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image` crate.

use super::format::ImageKind;
use super::params::ResampleParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identified {
    pub dimensions: Dimensions,
    pub format: ImageKind,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Read dimensions and container format without a full decode.
    fn identify(&self, path: &Path) -> Result<Identified, BackendError>;

    /// Crop, resample, sharpen and encode a derivative, returning the encoded
    /// bytes. Writing them to disk is the caller's job.
    fn resample(&self, params: &ResampleParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::ResizeGeometry;
    use crate::imaging::params::{Quality, Sharpening};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Mock backend that answers `identify` from a path map and records
    /// every call without touching pixels.
    #[derive(Default)]
    pub struct MockBackend {
        pub images: RefCell<HashMap<PathBuf, Identified>>,
        pub operations: RefCell<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resample {
            source: String,
            width: u32,
            height: u32,
            quality: u8,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register an image the mock will report for `path`.
        pub fn with_image(self, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
            self.add_image(path, width, height);
            self
        }

        pub fn add_image(&self, path: impl Into<PathBuf>, width: u32, height: u32) {
            let path = path.into();
            let format = ImageKind::from_filename(&path.to_string_lossy()).unwrap_or(ImageKind::Jpeg);
            self.images.borrow_mut().insert(
                path,
                Identified {
                    dimensions: Dimensions { width, height },
                    format,
                },
            );
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.borrow().clone()
        }

        pub fn resample_count(&self) -> usize {
            self.operations
                .borrow()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resample { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Identified, BackendError> {
            self.operations
                .borrow_mut()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.images
                .borrow()
                .get(path)
                .copied()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock image".to_string()))
        }

        fn resample(&self, params: &ResampleParams) -> Result<Vec<u8>, BackendError> {
            self.operations.borrow_mut().push(RecordedOp::Resample {
                source: params.source.to_string_lossy().to_string(),
                width: params.geometry.width,
                height: params.geometry.height,
                quality: params.quality.value(),
            });
            Ok(b"mock derivative".to_vec())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::new().with_image("/test/image.jpg", 800, 600);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.dimensions.width, 800);
        assert_eq!(result.dimensions.height, 600);
        assert_eq!(result.format, ImageKind::Jpeg);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_identify_unknown_path_errors() {
        let backend = MockBackend::new();
        assert!(backend.identify(Path::new("/missing.png")).is_err());
    }

    #[test]
    fn mock_records_resample() {
        let backend = MockBackend::new();

        let bytes = backend
            .resample(&ResampleParams {
                source: "/source.png".into(),
                format: ImageKind::Png,
                geometry: ResizeGeometry {
                    copy_x: 0,
                    copy_y: 0,
                    copy_width: 800,
                    copy_height: 600,
                    width: 400,
                    height: 300,
                },
                quality: Quality::new(85),
                sharpening: Sharpening::standard(),
            })
            .unwrap();

        assert!(!bytes.is_empty());
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Resample {
                source: "/source.png".to_string(),
                width: 400,
                height: 300,
                quality: 85,
            }]
        );
    }
}
