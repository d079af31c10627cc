//! Derivative metadata record stored per attachment.
//!
//! The metadata store keeps two attributes for every image attachment:
//!
//! - `_attached_file`: the source path relative to the media root.
//! - `_attachment_metadata`: a JSON document describing the source image and
//!   every derivative generated for it.
//!
//! ## Record shape
//!
//! ```json
//! {
//!   "width": 4000,
//!   "height": 3000,
//!   "file": "2020/01/photo.jpg",
//!   "sizes": {
//!     "thumbnail": { "file": "photo-300x275.jpg", "width": 300, "height": 275, "mime_type": "image/jpeg" }
//!   },
//!   "image_meta": { "camera": "", "iso": 0 }
//! }
//! ```
//!
//! Root fields and size-entry fields the tool does not understand (like
//! `image_meta`) pass through untouched. Size-entry fields are optional on
//! read: an entry missing its file or dimensions is a broken entry the
//! normalizer removes, not a parse failure.
//!
//! ## Change detection
//!
//! A record is rewritten only when [`AttachmentMetadata::to_json`] of the
//! reconciled record differs from the stored text. Serialization is
//! deterministic (sorted maps), so a fully reconciled record produces no write
//! on the next run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Attribute key holding the source path relative to the media root.
pub const ATTACHED_FILE_KEY: &str = "_attached_file";
/// Attribute key holding the serialized [`AttachmentMetadata`].
pub const ATTACHMENT_METADATA_KEY: &str = "_attachment_metadata";
/// Deprecated root key dropped during normalization.
pub const DEPRECATED_HWSTRING_KEY: &str = "hwstring_small";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    /// Source image width as found on disk.
    #[serde(default)]
    pub width: u32,
    /// Source image height as found on disk.
    #[serde(default)]
    pub height: u32,
    /// Source image path relative to the media root.
    #[serde(default)]
    pub file: String,
    /// Derivatives keyed by size name.
    #[serde(default)]
    pub sizes: BTreeMap<String, DerivativeEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One generated derivative. `file` is a bare filename in the source's directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivativeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DerivativeEntry {
    pub fn new(file: impl Into<String>, width: u32, height: u32, mime_type: &str) -> Self {
        Self {
            file: Some(file.into()),
            width: Some(width),
            height: Some(height),
            mime_type: Some(mime_type.to_string()),
            extra: Map::new(),
        }
    }

    /// `(width, height)` when both are present.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }
}

impl AttachmentMetadata {
    /// Empty record used when an attachment has no metadata attribute yet.
    pub fn shell() -> Self {
        let mut extra = Map::new();
        extra.insert(
            "image_meta".to_string(),
            json!({
                "aperture": 0,
                "camera": "",
                "caption": "",
                "copyright": "",
                "created_timestamp": 0,
                "credit": "",
                "focal_length": 0,
                "iso": 0,
                "shutter_speed": 0,
                "title": "",
            }),
        );
        Self {
            width: 0,
            height: 0,
            file: String::new(),
            sizes: BTreeMap::new(),
            extra,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Bare filenames of every derivative entry that has one.
    pub fn derivative_files(&self) -> impl Iterator<Item = &str> {
        self.sizes.values().filter_map(|entry| entry.file.as_deref())
    }
}
