//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` (header only) |
//! | Decode (GIF, JPEG, PNG) | `image` crate decoders |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resample | `DynamicImage::resize_exact` with the bilinear `Triangle` filter |
//! | Sharpening | `DynamicImage::filter3x3` (normalizes by the kernel sum) |
//! | Encode | `GifEncoder`, `JpegEncoder` (quality), `PngEncoder` |

use super::backend::{BackendError, Dimensions, Identified, ImageBackend};
use super::format::ImageKind;
use super::params::ResampleParams;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, ImageReader};
use std::path::Path;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn processing_error(path: &Path, what: &str, err: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to {} {}: {}", what, path.display(), err))
}

/// Load and decode an image from disk, sniffing the format from its content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| processing_error(path, "decode", e))
}

/// Encode a DynamicImage in the given format.
fn encode_image(
    img: &DynamicImage,
    format: ImageKind,
    quality: u8,
) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    let result = match format {
        ImageKind::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality)),
        ImageKind::Png => img.write_with_encoder(PngEncoder::new(&mut bytes)),
        ImageKind::Gif => {
            // The GIF trailer is written when the encoder drops.
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.encode_frame(Frame::new(img.to_rgba8()))
        }
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{} encode failed: {}", format, e)))?;
    Ok(bytes)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Identified, BackendError> {
        let reader = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?;
        let format = reader
            .format()
            .and_then(ImageKind::from_format)
            .ok_or_else(|| processing_error(path, "identify", "unsupported image format"))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| processing_error(path, "read dimensions of", e))?;
        Ok(Identified {
            dimensions: Dimensions { width, height },
            format,
        })
    }

    fn resample(&self, params: &ResampleParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let g = params.geometry;

        let region = img.crop_imm(g.copy_x, g.copy_y, g.copy_width, g.copy_height);
        let resized = region.resize_exact(g.width, g.height, FilterType::Triangle);
        let sharpened = resized.filter3x3(&params.sharpening.kernel);

        encode_image(&sharpened, params.format, params.quality.value())
    }
}
