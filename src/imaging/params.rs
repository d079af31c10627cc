//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between [`operations`](super::operations) (which decides what derivative to
//! create) and the [`backend`](super::backend) (which does the pixel work), so
//! a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1-100, default 90). Clamped on construction.
//! - [`Sharpening`]: the 3×3 convolution applied to every derivative.
//! - [`ResampleParams`]: source, format, crop rectangle and output size for one derivative.

use super::calculations::ResizeGeometry;
use super::format::ImageKind;
use std::path::PathBuf;

/// Quality setting for lossy (JPEG) encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// 3×3 sharpening convolution, row-major.
///
/// The divisor is the kernel's own weight sum, so flat regions keep their
/// brightness while edges are emphasised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub kernel: [f32; 9],
}

impl Sharpening {
    /// Center weight 20, edges -1, corners -1.2 (weight sum 11.2).
    pub fn standard() -> Self {
        Self {
            kernel: [
                -1.2, -1.0, -1.2, //
                -1.0, 20.0, -1.0, //
                -1.2, -1.0, -1.2,
            ],
        }
    }

    pub fn divisor(&self) -> f32 {
        self.kernel.iter().sum()
    }
}

impl Default for Sharpening {
    fn default() -> Self {
        Self::standard()
    }
}

/// Everything needed to render one derivative from its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleParams {
    pub source: PathBuf,
    /// Format of the source; the derivative is encoded in the same format.
    pub format: ImageKind,
    pub geometry: ResizeGeometry,
    pub quality: Quality,
    pub sharpening: Sharpening,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn sharpening_kernel_shape() {
        let s = Sharpening::standard();
        assert_eq!(s.kernel[4], 20.0);
        assert_eq!(s.kernel[1], -1.0);
        assert_eq!(s.kernel[0], -1.2);
    }

    #[test]
    fn sharpening_divisor_is_weight_sum() {
        assert!((Sharpening::standard().divisor() - 11.2).abs() < 1e-4);
    }
}
