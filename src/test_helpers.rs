//! Shared test utilities.
//!
//! Real image fixtures are synthesized on the fly with the `image` crate so
//! tests never depend on binary files in the repository.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_test_image(&tmp.path().join("2020/01/photo.jpg"), 800, 600);
//! let store = store_with(&[("https://example.com/uploads/2020/01/photo.jpg", "image/jpeg")]);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

use crate::store::SqliteStore;
use crate::types::AttachmentId;

// =========================================================================
// Image fixtures
// =========================================================================

/// Write a gradient image of the given size, encoded by file extension
/// (`.jpg`/`.jpeg`, `.png`, `.gif`). Parent directories are created.
pub fn write_test_image(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let format = ImageFormat::from_path(path)
        .unwrap_or_else(|e| panic!("no image format for {}: {e}", path.display()));
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(img).to_rgba8()),
        _ => DynamicImage::ImageRgb8(img),
    };
    img.save_with_format(path, format).unwrap();
}

/// Dimensions of an image file on disk.
pub fn image_dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

// =========================================================================
// Store fixtures
// =========================================================================

/// In-memory store seeded with `(locator, mime_type)` attachments.
pub fn store_with(attachments: &[(&str, &str)]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    for (locator, mime) in attachments {
        store.insert_attachment(locator, mime).unwrap();
    }
    store
}

/// Ids of every attachment in the store, ascending.
pub fn attachment_ids(store: &SqliteStore) -> Vec<AttachmentId> {
    use crate::store::MetadataStore;
    store
        .list_attachments(0, usize::MAX >> 1)
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_each_format_at_requested_size() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.jpg", "b.png", "c.gif", "nested/d.jpeg"] {
            let path = tmp.path().join(name);
            write_test_image(&path, 31, 17);
            assert_eq!(image_dimensions(&path), (31, 17), "{name}");
        }
    }

    #[test]
    fn store_with_seeds_rows() {
        let store = store_with(&[("http://x/a.jpg", "image/jpeg"), ("http://x/b.png", "")]);
        assert_eq!(attachment_ids(&store), vec![1, 2]);
    }
}
