//! Derivative synthesis and orphan cleanup.
//!
//! Runs after [`crate::normalize`]. Every policy size without a surviving
//! entry is rendered through the backend and recorded; then sibling files
//! shaped like derivatives of the source but referenced by no entry are
//! deleted.
//!
//! A failed render is fatal for the run. A failed orphan deletion is
//! reported as [`RecordChange::OrphanDeleteFailed`] and the item carries on.

use crate::imaging::{
    BackendError, ImageBackend, Quality, create_derivative, plan_derivative, resize_geometry,
};
use crate::metadata::{AttachmentMetadata, DerivativeEntry};
use crate::naming::{DerivativePattern, derivative_filename};
use crate::normalize::{RecordChange, SourceImage};
use crate::scan::derivative_candidates;
use crate::types::SizePolicy;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("failed to create {file}: {source}")]
    Create {
        file: String,
        #[source]
        source: BackendError,
    },
    #[error("failed to scan for orphans: {0}")]
    Scan(#[from] io::Error),
}

/// Create every missing policy size and record it in `record`.
///
/// Sizes whose geometry says "no resize needed" get no entry.
pub fn create_missing(
    record: &mut AttachmentMetadata,
    source: &SourceImage,
    policy: &SizePolicy,
    quality: Quality,
    backend: &impl ImageBackend,
) -> Result<Vec<RecordChange>, SynthesisError> {
    let mut changes = Vec::new();
    let source_dims = (record.width, record.height);

    for (size, spec) in policy {
        if record.sizes.contains_key(size) {
            continue;
        }
        let Some(geometry) = resize_geometry(source_dims, spec) else {
            continue;
        };
        let file = derivative_filename(&source.filename, geometry.width, geometry.height);
        let output = source.directory().join(&file);
        let params = plan_derivative(&source.path, &source.identified, geometry, quality);
        create_derivative(backend, &params, &output).map_err(|e| SynthesisError::Create {
            file: file.clone(),
            source: e,
        })?;

        record.sizes.insert(
            size.clone(),
            DerivativeEntry::new(
                file.clone(),
                geometry.width,
                geometry.height,
                source.mime_type(),
            ),
        );
        changes.push(RecordChange::DerivativeCreated {
            size: size.clone(),
            file,
            width: geometry.width,
            height: geometry.height,
        });
    }

    Ok(changes)
}

/// Delete sibling files named like derivatives of `source` that `record`
/// does not reference.
///
/// Only names matching `<stem>-<digits>x<digits><ext>` are eligible, so the
/// source and unrelated same-stem files are never touched.
pub fn delete_orphans(
    record: &AttachmentMetadata,
    source: &SourceImage,
) -> Result<Vec<RecordChange>, SynthesisError> {
    remove_orphans(record, source, |path| std::fs::remove_file(path))
}

/// A failed `remove` is reported per file and the sweep carries on.
fn remove_orphans(
    record: &AttachmentMetadata,
    source: &SourceImage,
    mut remove: impl FnMut(&Path) -> io::Result<()>,
) -> Result<Vec<RecordChange>, SynthesisError> {
    let Some(pattern) = DerivativePattern::for_source(&source.filename) else {
        return Ok(Vec::new());
    };
    let referenced: HashSet<&str> = record.derivative_files().collect();

    let mut changes = Vec::new();
    for candidate in derivative_candidates(&source.path)? {
        let Some(name) = candidate.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == source.filename || referenced.contains(name) || !pattern.matches(name) {
            continue;
        }
        let file = name.to_string();
        match remove(&candidate) {
            Ok(()) => changes.push(RecordChange::OrphanDeleted { file }),
            Err(e) => changes.push(RecordChange::OrphanDeleteFailed {
                file,
                error: e.to_string(),
            }),
        }
    }
    Ok(changes)
}

/// [`create_missing`] followed by [`delete_orphans`].
pub fn synthesize(
    record: &mut AttachmentMetadata,
    source: &SourceImage,
    policy: &SizePolicy,
    quality: Quality,
    backend: &impl ImageBackend,
) -> Result<Vec<RecordChange>, SynthesisError> {
    let mut changes = create_missing(record, source, policy, quality, backend)?;
    changes.extend(delete_orphans(record, source)?);
    Ok(changes)
}
