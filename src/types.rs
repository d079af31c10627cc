//! Shared types used across the reconciliation stages.
//!
//! [`SizeSpec`] is deserialized straight out of `rethumb.toml`; [`Attachment`]
//! is what the metadata store hands the driver for every media item.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named entry of the size policy: the box a derivative must fit.
///
/// A zero dimension means "unconstrained". At least one of `width`/`height`
/// must be non-zero (enforced by [`crate::config::Config::validate`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeSpec {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Crop to fill the exact box (cover) instead of shrinking to fit (contain).
    #[serde(default)]
    pub crop: bool,
}

impl SizeSpec {
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            crop: false,
        }
    }

    pub fn crop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            crop: true,
        }
    }
}

/// Size policy keyed by size name. Ordering carries no meaning; a `BTreeMap`
/// just keeps iteration (and therefore log output) deterministic.
pub type SizePolicy = BTreeMap<String, SizeSpec>;

/// Identifier of an attachment in the metadata store.
pub type AttachmentId = i64;

/// A media item as recorded by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: AttachmentId,
    /// Canonical public locator, e.g. `https://example.com/uploads/2020/01/a.jpg`.
    pub locator: String,
    /// MIME type the store currently declares for the item.
    pub mime_type: String,
}
