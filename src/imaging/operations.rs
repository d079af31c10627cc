//! High-level image operations.
//!
//! These functions combine geometry with backend execution and own the
//! filesystem side of derivative creation.

use super::backend::{BackendError, Identified, ImageBackend};
use super::calculations::ResizeGeometry;
use super::params::{Quality, ResampleParams, Sharpening};
use std::io::Write;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Plan a resample without executing it.
pub fn plan_derivative(
    source: &Path,
    source_info: &Identified,
    geometry: ResizeGeometry,
    quality: Quality,
) -> ResampleParams {
    ResampleParams {
        source: source.to_path_buf(),
        format: source_info.format,
        geometry,
        quality,
        sharpening: Sharpening::standard(),
    }
}

/// Render a derivative and move it into place at `output`.
///
/// The bytes go to a scratch file in the output directory first and are then
/// renamed over `output`, so a reader never sees a partially written image
/// under the final name.
pub fn create_derivative(
    backend: &impl ImageBackend,
    params: &ResampleParams,
    output: &Path,
) -> Result<()> {
    let bytes = backend.resample(params)?;
    write_atomically(output, &bytes)
}

fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut scratch = tempfile::Builder::new()
        .prefix(".rethumb-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    scratch.write_all(bytes)?;
    scratch.as_file().sync_all()?;
    scratch.persist(output).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}
