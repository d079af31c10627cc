//! Attachment reconciliation driver.
//!
//! Pages through every attachment in the metadata store (ascending id,
//! `id > last_seen`, until an empty page) and brings each one in line with
//! the size policy and the files on disk.
//!
//! ## Per attachment
//!
//! ```text
//! locator ──strip public_url──▶ relative path ──extension──▶ ImageKind
//!    │                                                          │
//!    ▼                                                          ▼
//! source exists? ──▶ MIME fix ──▶ attributes (≤ 2 rows) ──▶ _attached_file fix
//!                                                                │
//!            record (stored or shell) ◀──────────────────────────┘
//!                    │
//!          identify source ──▶ normalize ──▶ synthesize ──▶ write if changed
//! ```
//!
//! Items that cannot be handled safely are skipped with a [`SkipReason`] and
//! left untouched. Store and image-creation failures stop the run.
//!
//! ## Events
//!
//! Every action is reported as a [`ReconcileEvent`] on an optional channel so
//! the caller can print progress while the run is underway. The same events
//! are tallied into the returned [`ReconcileSummary`].

use crate::config::Config;
use crate::imaging::{ImageBackend, ImageKind, Quality};
use crate::metadata::{ATTACHED_FILE_KEY, ATTACHMENT_METADATA_KEY, AttachmentMetadata};
use crate::normalize::{RecordChange, SourceImage, normalize};
use crate::store::{MetadataStore, StoreError, Upsert};
use crate::synthesize::{SynthesisError, synthesize};
use crate::types::{Attachment, AttachmentId, SizePolicy};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("metadata store error: {0}")]
    Store(#[from] StoreError),
    #[error("attachment {id}: {source}")]
    Synthesis {
        id: AttachmentId,
        #[source]
        source: SynthesisError,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings the driver needs, lifted out of [`Config`].
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub media_root: PathBuf,
    pub public_url: String,
    pub policy: SizePolicy,
    pub quality: Quality,
    pub page_size: usize,
}

impl ReconcileConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            media_root: config.media_root.clone(),
            public_url: config.public_url.clone(),
            policy: config.sizes.clone(),
            quality: Quality::new(config.jpeg_quality),
            page_size: config.page_size,
        }
    }
}

/// Why an attachment was left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Locator does not start with the configured public URL.
    ForeignLocator { locator: String },
    /// Relative path is absolute or climbs out of the media root.
    OutsideMediaRoot { relative: String },
    SourceMissing { path: PathBuf },
    /// More attribute rows than requested keys.
    AmbiguousAttributes { found: usize, expected: usize },
    UnparseableMetadata { error: String },
    UnreadableSource { error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ForeignLocator { locator } => {
                write!(f, "locator outside public URL: {locator}")
            }
            SkipReason::OutsideMediaRoot { relative } => {
                write!(f, "path escapes media root: {relative}")
            }
            SkipReason::SourceMissing { path } => {
                write!(f, "source file missing: {}", path.display())
            }
            SkipReason::AmbiguousAttributes { found, expected } => {
                write!(f, "{found} attribute rows, expected at most {expected}")
            }
            SkipReason::UnparseableMetadata { error } => {
                write!(f, "stored metadata unreadable: {error}")
            }
            SkipReason::UnreadableSource { error } => {
                write!(f, "source image unreadable: {error}")
            }
        }
    }
}

/// Progress and action reports emitted while reconciling.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileEvent {
    Skipped {
        id: AttachmentId,
        reason: SkipReason,
    },
    MimeCorrected {
        id: AttachmentId,
        from: String,
        to: String,
    },
    AttachedFileWritten {
        id: AttachmentId,
        file: String,
        upsert: Upsert,
    },
    RecordChanged {
        id: AttachmentId,
        change: RecordChange,
    },
    MetadataWritten {
        id: AttachmentId,
        upsert: Upsert,
    },
    PageCompleted {
        processed: usize,
    },
}

/// Totals for a reconcile run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub processed: usize,
    pub not_images: usize,
    pub skipped: usize,
    pub mime_corrected: usize,
    pub attached_file_written: usize,
    pub records_written: usize,
    pub entries_removed: usize,
    pub derivatives_created: usize,
    pub orphans_deleted: usize,
    pub orphan_delete_failures: usize,
}

impl ReconcileSummary {
    fn record(&mut self, event: &ReconcileEvent) {
        match event {
            ReconcileEvent::Skipped { .. } => self.skipped += 1,
            ReconcileEvent::MimeCorrected { .. } => self.mime_corrected += 1,
            ReconcileEvent::AttachedFileWritten { .. } => self.attached_file_written += 1,
            ReconcileEvent::MetadataWritten { .. } => self.records_written += 1,
            ReconcileEvent::PageCompleted { processed } => self.processed = *processed,
            ReconcileEvent::RecordChanged { change, .. } => match change {
                RecordChange::EntryRemoved { .. } => self.entries_removed += 1,
                RecordChange::DerivativeCreated { .. } => self.derivatives_created += 1,
                RecordChange::OrphanDeleted { .. } => self.orphans_deleted += 1,
                RecordChange::OrphanDeleteFailed { .. } => self.orphan_delete_failures += 1,
                _ => {}
            },
        }
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attachments, {} skipped, {} not images, {} records written, \
             {} derivatives created, {} entries removed, {} orphans deleted",
            self.processed,
            self.skipped,
            self.not_images,
            self.records_written,
            self.derivatives_created,
            self.entries_removed,
            self.orphans_deleted,
        )?;
        if self.orphan_delete_failures > 0 {
            write!(f, " ({} failed)", self.orphan_delete_failures)?;
        }
        Ok(())
    }
}

/// What happened to one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not an image by extension; nothing done, nothing reported.
    NotAnImage,
    Skipped,
    Reconciled,
}

/// Tallies events and forwards them to the optional listener.
struct Reporter {
    events: Option<Sender<ReconcileEvent>>,
    summary: ReconcileSummary,
}

impl Reporter {
    fn emit(&mut self, event: ReconcileEvent) {
        self.summary.record(&event);
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is printing.
            tx.send(event).ok();
        }
    }

    fn skip(&mut self, id: AttachmentId, reason: SkipReason) -> Outcome {
        self.emit(ReconcileEvent::Skipped { id, reason });
        Outcome::Skipped
    }
}

/// Reconcile every attachment in the store.
pub fn reconcile(
    store: &impl MetadataStore,
    backend: &impl ImageBackend,
    config: &ReconcileConfig,
    events: Option<Sender<ReconcileEvent>>,
) -> Result<ReconcileSummary, ReconcileError> {
    let mut reporter = Reporter {
        events,
        summary: ReconcileSummary::default(),
    };
    let page_size = config.page_size.max(1);
    let mut after_id: AttachmentId = 0;
    let mut processed = 0;

    loop {
        let page = store.list_attachments(after_id, page_size)?;
        if page.is_empty() {
            break;
        }
        for attachment in &page {
            let outcome = reconcile_one(store, backend, config, attachment, &mut reporter)?;
            if outcome == Outcome::NotAnImage {
                reporter.summary.not_images += 1;
            }
            after_id = attachment.id;
        }
        processed += page.len();
        reporter.emit(ReconcileEvent::PageCompleted { processed });
    }

    Ok(reporter.summary)
}

/// Reconcile a single attachment, reporting through `events`.
pub fn reconcile_attachment(
    store: &impl MetadataStore,
    backend: &impl ImageBackend,
    config: &ReconcileConfig,
    attachment: &Attachment,
    events: Option<Sender<ReconcileEvent>>,
) -> Result<Outcome, ReconcileError> {
    let mut reporter = Reporter {
        events,
        summary: ReconcileSummary::default(),
    };
    reconcile_one(store, backend, config, attachment, &mut reporter)
}

/// Only plain name components: no root, prefix, `.` or `..`.
fn stays_under_root(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn reconcile_one(
    store: &impl MetadataStore,
    backend: &impl ImageBackend,
    config: &ReconcileConfig,
    attachment: &Attachment,
    reporter: &mut Reporter,
) -> Result<Outcome, ReconcileError> {
    let id = attachment.id;
    let _span = tracing::debug_span!("attachment", id).entered();

    let Some(relative) = attachment
        .locator
        .strip_prefix(config.public_url.as_str())
        .filter(|rest| !rest.is_empty())
    else {
        return Ok(reporter.skip(
            id,
            SkipReason::ForeignLocator {
                locator: attachment.locator.clone(),
            },
        ));
    };
    let Some(kind) = ImageKind::from_filename(relative) else {
        tracing::debug!(locator = %attachment.locator, "not an image");
        return Ok(Outcome::NotAnImage);
    };
    if !stays_under_root(relative) {
        return Ok(reporter.skip(
            id,
            SkipReason::OutsideMediaRoot {
                relative: relative.to_string(),
            },
        ));
    }
    let path = config.media_root.join(relative);
    if !path.is_file() {
        return Ok(reporter.skip(id, SkipReason::SourceMissing { path }));
    }

    if attachment.mime_type != kind.mime_type() {
        store.update_mime_type(id, kind.mime_type())?;
        reporter.emit(ReconcileEvent::MimeCorrected {
            id,
            from: attachment.mime_type.clone(),
            to: kind.mime_type().to_string(),
        });
    }

    let attributes = match store.get_attributes(id, &[ATTACHED_FILE_KEY, ATTACHMENT_METADATA_KEY])
    {
        Ok(attributes) => attributes,
        Err(StoreError::AmbiguousAttributes { found, expected }) => {
            return Ok(reporter.skip(id, SkipReason::AmbiguousAttributes { found, expected }));
        }
        Err(e) => return Err(e.into()),
    };

    if attributes.get(ATTACHED_FILE_KEY).map(String::as_str) != Some(relative) {
        let upsert = store.upsert_attribute(id, ATTACHED_FILE_KEY, relative)?;
        reporter.emit(ReconcileEvent::AttachedFileWritten {
            id,
            file: relative.to_string(),
            upsert,
        });
    }

    let stored = attributes.get(ATTACHMENT_METADATA_KEY);
    let record = match stored {
        Some(raw) => match AttachmentMetadata::parse(raw) {
            Ok(record) => record,
            Err(e) => {
                return Ok(reporter.skip(
                    id,
                    SkipReason::UnparseableMetadata {
                        error: e.to_string(),
                    },
                ));
            }
        },
        None => AttachmentMetadata::shell(),
    };

    let identified = match backend.identify(&path) {
        Ok(identified) => identified,
        Err(e) => {
            return Ok(reporter.skip(
                id,
                SkipReason::UnreadableSource {
                    error: e.to_string(),
                },
            ));
        }
    };

    let source = SourceImage {
        relative_file: relative.to_string(),
        filename: bare_filename(relative).to_string(),
        path,
        kind,
        identified,
    };

    let normalized = normalize(record, &source, &config.policy, backend);
    for change in normalized.changes {
        reporter.emit(ReconcileEvent::RecordChanged { id, change });
    }
    let mut record = normalized.record;

    let changes = synthesize(&mut record, &source, &config.policy, config.quality, backend)
        .map_err(|source| ReconcileError::Synthesis { id, source })?;
    for change in changes {
        reporter.emit(ReconcileEvent::RecordChanged { id, change });
    }

    let serialized = record.to_json()?;
    if stored.map(String::as_str) != Some(serialized.as_str()) {
        let upsert = store.upsert_attribute(id, ATTACHMENT_METADATA_KEY, &serialized)?;
        reporter.emit(ReconcileEvent::MetadataWritten { id, upsert });
    }

    Ok(Outcome::Reconciled)
}

fn bare_filename(relative: &str) -> &str {
    Path::new(relative)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(relative)
}
