//! Metadata record normalization.
//!
//! Takes a loaded (or shell) [`AttachmentMetadata`] and returns a record whose
//! root fields describe the source image as it exists on disk and whose
//! `sizes` map holds only entries that are still valid for the current size
//! policy. Nothing is created or deleted on disk here; missing sizes are the
//! job of [`crate::synthesize`].
//!
//! ## Order of work
//!
//! 1. Root correction: `width`, `height` and `file` are replaced with the
//!    probed source values and the deprecated `hwstring_small` key is dropped.
//!    This runs first because the per-entry checks read the corrected root.
//! 2. Per-entry checks, in order, first failure removes the entry:
//!
//! | # | Check | [`RemovalReason`] |
//! |---|---|---|
//! | 1 | size name still in policy | `NotInPolicy` |
//! | 2 | entry has file, width and height | `Incomplete` |
//! | 3 | file is not the source itself | `IsSource` |
//! | 4 | file exists next to the source | `FileMissing` |
//! | 5 | policy geometry still produces a derivative | `NoLongerNeeded` |
//! | 6 | policy geometry matches stored dimensions | `PolicyMismatch` |
//! | 7 | probed file dimensions match stored dimensions | `DiskMismatch` |
//! | 8 | file name follows the naming rule | `MisNamed` |
//!
//! 3. Surviving entries get their `mime_type` set to the source's MIME type.

use crate::imaging::{Dimensions, ImageBackend, ImageKind, Identified, resize_geometry};
use crate::metadata::{AttachmentMetadata, DEPRECATED_HWSTRING_KEY, DerivativeEntry};
use crate::naming::derivative_filename;
use crate::types::SizePolicy;
use std::fmt;
use std::path::{Path, PathBuf};

/// The probed source image of one attachment.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Path relative to the media root, e.g. `2020/01/photo.jpg`.
    pub relative_file: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Bare filename, e.g. `photo.jpg`.
    pub filename: String,
    /// Type derived from the file extension.
    pub kind: ImageKind,
    /// What the backend found in the file.
    pub identified: Identified,
}

impl SourceImage {
    pub fn dimensions(&self) -> Dimensions {
        self.identified.dimensions
    }

    /// Directory holding the source and its derivatives.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// Why a derivative entry was dropped from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    NotInPolicy,
    Incomplete,
    IsSource,
    FileMissing,
    NoLongerNeeded,
    PolicyMismatch,
    DiskMismatch,
    MisNamed,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemovalReason::NotInPolicy => "size no longer configured",
            RemovalReason::Incomplete => "entry missing file or dimensions",
            RemovalReason::IsSource => "entry points at the source image",
            RemovalReason::FileMissing => "file missing on disk",
            RemovalReason::NoLongerNeeded => "source too small for this size",
            RemovalReason::PolicyMismatch => "dimensions differ from size policy",
            RemovalReason::DiskMismatch => "dimensions differ from file on disk",
            RemovalReason::MisNamed => "file name does not match dimensions",
        };
        f.write_str(text)
    }
}

/// One change applied to a record during normalization or synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    /// Root `width`/`height` replaced with the probed source dimensions.
    DimensionsCorrected {
        from: (u32, u32),
        to: (u32, u32),
    },
    /// Root `file` replaced with the source's relative path.
    FileCorrected { from: String, to: String },
    DeprecatedKeyDropped(&'static str),
    EntryRemoved {
        size: String,
        file: Option<String>,
        reason: RemovalReason,
    },
    EntryMimeCorrected { size: String, mime_type: String },
    DerivativeCreated {
        size: String,
        file: String,
        width: u32,
        height: u32,
    },
    OrphanDeleted { file: String },
    OrphanDeleteFailed { file: String, error: String },
}

/// Output of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: AttachmentMetadata,
    pub changes: Vec<RecordChange>,
}

/// Reconcile a record's root fields and existing derivative entries against
/// the probed source and the size policy.
pub fn normalize(
    mut record: AttachmentMetadata,
    source: &SourceImage,
    policy: &SizePolicy,
    backend: &impl ImageBackend,
) -> Normalized {
    let mut changes = Vec::new();

    let dims = source.dimensions();
    if (record.width, record.height) != (dims.width, dims.height) {
        changes.push(RecordChange::DimensionsCorrected {
            from: (record.width, record.height),
            to: (dims.width, dims.height),
        });
        record.width = dims.width;
        record.height = dims.height;
    }
    if record.file != source.relative_file {
        changes.push(RecordChange::FileCorrected {
            from: std::mem::take(&mut record.file),
            to: source.relative_file.clone(),
        });
        record.file = source.relative_file.clone();
    }
    if record.extra.remove(DEPRECATED_HWSTRING_KEY).is_some() {
        changes.push(RecordChange::DeprecatedKeyDropped(DEPRECATED_HWSTRING_KEY));
    }

    let root = (record.width, record.height);
    let sizes = std::mem::take(&mut record.sizes);
    for (size, mut entry) in sizes {
        if let Some(reason) = check_entry(&size, &entry, root, source, policy, backend) {
            changes.push(RecordChange::EntryRemoved {
                size,
                file: entry.file,
                reason,
            });
            continue;
        }
        if entry.mime_type.as_deref() != Some(source.mime_type()) {
            entry.mime_type = Some(source.mime_type().to_string());
            changes.push(RecordChange::EntryMimeCorrected {
                size: size.clone(),
                mime_type: source.mime_type().to_string(),
            });
        }
        record.sizes.insert(size, entry);
    }

    Normalized { record, changes }
}

/// Run the eight entry checks in order; `Some` names the first that failed.
fn check_entry(
    size: &str,
    entry: &DerivativeEntry,
    root: (u32, u32),
    source: &SourceImage,
    policy: &SizePolicy,
    backend: &impl ImageBackend,
) -> Option<RemovalReason> {
    let Some(spec) = policy.get(size) else {
        return Some(RemovalReason::NotInPolicy);
    };
    let (Some(file), Some((width, height))) = (entry.file.as_deref(), entry.dimensions()) else {
        return Some(RemovalReason::Incomplete);
    };
    if file == source.filename {
        return Some(RemovalReason::IsSource);
    }
    let path = source.directory().join(file);
    if !path.is_file() {
        return Some(RemovalReason::FileMissing);
    }
    let Some(geometry) = resize_geometry(root, spec) else {
        return Some(RemovalReason::NoLongerNeeded);
    };
    if (geometry.width, geometry.height) != (width, height) {
        return Some(RemovalReason::PolicyMismatch);
    }
    match backend.identify(&path) {
        Ok(found) if found.dimensions == (Dimensions { width, height }) => {}
        _ => return Some(RemovalReason::DiskMismatch),
    }
    if file != derivative_filename(&source.filename, width, height) {
        return Some(RemovalReason::MisNamed);
    }
    None
}
