//! CLI output formatting.
//!
//! Every reconcile action becomes exactly one line that leads with the
//! attachment id, so a log can be grepped per item:
//!
//! ```text
//! #42 mime type image/jpeg → image/png
//! #42 _attached_file inserted: 2020/01/photo.png
//! #42 dimensions 0x0 → 4000x3000
//! #42 removed medium (photo-610x610.png): dimensions differ from size policy
//! #42 created medium photo-610x457.png (610x457)
//! #42 deleted orphan photo-610x610.png
//! #42 metadata updated
//! #57 skipped: source file missing: /srv/uploads/2020/02/gone.jpg
//! 50 attachments processed
//! ```
//!
//! # Architecture
//!
//! `format_*` functions are pure (no I/O) so they can be unit tested; the
//! binary decides where the lines go and at which level.

use crate::audit::AuditReport;
use crate::normalize::RecordChange;
use crate::reconcile::{ReconcileEvent, ReconcileSummary};
use crate::store::Upsert;
use std::path::Path;

fn upsert_word(upsert: Upsert) -> &'static str {
    match upsert {
        Upsert::Inserted => "inserted",
        Upsert::Updated => "updated",
    }
}

fn format_change(change: &RecordChange) -> String {
    match change {
        RecordChange::DimensionsCorrected { from, to } => {
            format!("dimensions {}x{} \u{2192} {}x{}", from.0, from.1, to.0, to.1)
        }
        RecordChange::FileCorrected { from, to } => format!("file {from:?} \u{2192} {to}"),
        RecordChange::DeprecatedKeyDropped(key) => format!("dropped {key}"),
        RecordChange::EntryRemoved { size, file, reason } => match file {
            Some(file) => format!("removed {size} ({file}): {reason}"),
            None => format!("removed {size}: {reason}"),
        },
        RecordChange::EntryMimeCorrected { size, mime_type } => {
            format!("{size} mime type \u{2192} {mime_type}")
        }
        RecordChange::DerivativeCreated {
            size,
            file,
            width,
            height,
        } => format!("created {size} {file} ({width}x{height})"),
        RecordChange::OrphanDeleted { file } => format!("deleted orphan {file}"),
        RecordChange::OrphanDeleteFailed { file, error } => {
            format!("failed to delete orphan {file}: {error}")
        }
    }
}

/// Format one reconcile event as a single display line.
pub fn format_event(event: &ReconcileEvent) -> String {
    match event {
        ReconcileEvent::Skipped { id, reason } => format!("#{id} skipped: {reason}"),
        ReconcileEvent::MimeCorrected { id, from, to } => {
            format!("#{id} mime type {from} \u{2192} {to}")
        }
        ReconcileEvent::AttachedFileWritten { id, file, upsert } => {
            format!("#{id} _attached_file {}: {file}", upsert_word(*upsert))
        }
        ReconcileEvent::RecordChanged { id, change } => format!("#{id} {}", format_change(change)),
        ReconcileEvent::MetadataWritten { id, upsert } => {
            format!("#{id} metadata {}", upsert_word(*upsert))
        }
        ReconcileEvent::PageCompleted { processed } => {
            format!("{processed} attachments processed")
        }
    }
}

/// Whether an event reports a problem rather than a correction.
pub fn is_warning(event: &ReconcileEvent) -> bool {
    matches!(
        event,
        ReconcileEvent::Skipped { .. }
            | ReconcileEvent::RecordChanged {
                change: RecordChange::OrphanDeleteFailed { .. },
                ..
            }
    )
}

/// Format the end-of-run totals.
pub fn format_summary(summary: &ReconcileSummary) -> Vec<String> {
    let mut lines = vec![format!("Reconciled: {summary}")];
    if summary.mime_corrected > 0 || summary.attached_file_written > 0 {
        lines.push(format!(
            "    {} mime types corrected, {} _attached_file rows written",
            summary.mime_corrected, summary.attached_file_written
        ));
    }
    lines
}

/// Format audit results and the report file locations.
pub fn format_audit(report: &AuditReport, written: &[impl AsRef<Path>]) -> Vec<String> {
    let mut lines = vec![format!(
        "Audited {} records: {} unused, {} missing",
        report.records,
        report.unused.len(),
        report.missing.len()
    )];
    if report.unparseable > 0 {
        lines.push(format!("    {} records unparseable", report.unparseable));
    }
    for path in written {
        lines.push(format!("    \u{2192} {}", path.as_ref().display()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RemovalReason;
    use crate::reconcile::SkipReason;
    use std::path::PathBuf;

    fn changed(change: RecordChange) -> ReconcileEvent {
        ReconcileEvent::RecordChanged { id: 42, change }
    }

    // =========================================================================
    // format_event
    // =========================================================================

    #[test]
    fn skip_line() {
        let event = ReconcileEvent::Skipped {
            id: 7,
            reason: SkipReason::AmbiguousAttributes {
                found: 3,
                expected: 2,
            },
        };
        assert_eq!(
            format_event(&event),
            "#7 skipped: 3 attribute rows, expected at most 2"
        );
    }

    #[test]
    fn skip_missing_source_line() {
        let event = ReconcileEvent::Skipped {
            id: 9,
            reason: SkipReason::SourceMissing {
                path: PathBuf::from("/srv/uploads/a.jpg"),
            },
        };
        assert_eq!(
            format_event(&event),
            "#9 skipped: source file missing: /srv/uploads/a.jpg"
        );
    }

    #[test]
    fn mime_line() {
        let event = ReconcileEvent::MimeCorrected {
            id: 42,
            from: "image/jpeg".into(),
            to: "image/png".into(),
        };
        assert_eq!(format_event(&event), "#42 mime type image/jpeg \u{2192} image/png");
    }

    #[test]
    fn attached_file_line() {
        let event = ReconcileEvent::AttachedFileWritten {
            id: 42,
            file: "2020/01/a.jpg".into(),
            upsert: Upsert::Inserted,
        };
        assert_eq!(format_event(&event), "#42 _attached_file inserted: 2020/01/a.jpg");
    }

    #[test]
    fn record_change_lines() {
        let cases = [
            (
                RecordChange::DimensionsCorrected {
                    from: (0, 0),
                    to: (4000, 3000),
                },
                "#42 dimensions 0x0 \u{2192} 4000x3000",
            ),
            (
                RecordChange::FileCorrected {
                    from: String::new(),
                    to: "2020/01/a.jpg".into(),
                },
                "#42 file \"\" \u{2192} 2020/01/a.jpg",
            ),
            (
                RecordChange::DeprecatedKeyDropped("hwstring_small"),
                "#42 dropped hwstring_small",
            ),
            (
                RecordChange::EntryRemoved {
                    size: "medium".into(),
                    file: Some("a-610x610.jpg".into()),
                    reason: RemovalReason::PolicyMismatch,
                },
                "#42 removed medium (a-610x610.jpg): dimensions differ from size policy",
            ),
            (
                RecordChange::EntryRemoved {
                    size: "medium".into(),
                    file: None,
                    reason: RemovalReason::Incomplete,
                },
                "#42 removed medium: entry missing file or dimensions",
            ),
            (
                RecordChange::EntryMimeCorrected {
                    size: "thumbnail".into(),
                    mime_type: "image/gif".into(),
                },
                "#42 thumbnail mime type \u{2192} image/gif",
            ),
            (
                RecordChange::DerivativeCreated {
                    size: "medium".into(),
                    file: "a-610x457.jpg".into(),
                    width: 610,
                    height: 457,
                },
                "#42 created medium a-610x457.jpg (610x457)",
            ),
            (
                RecordChange::OrphanDeleted {
                    file: "a-1x1.jpg".into(),
                },
                "#42 deleted orphan a-1x1.jpg",
            ),
        ];
        for (change, expected) in cases {
            assert_eq!(format_event(&changed(change)), expected);
        }
    }

    #[test]
    fn metadata_written_line() {
        let event = ReconcileEvent::MetadataWritten {
            id: 3,
            upsert: Upsert::Updated,
        };
        assert_eq!(format_event(&event), "#3 metadata updated");
    }

    #[test]
    fn page_line() {
        let event = ReconcileEvent::PageCompleted { processed: 150 };
        assert_eq!(format_event(&event), "150 attachments processed");
    }

    // =========================================================================
    // is_warning
    // =========================================================================

    #[test]
    fn warnings_are_skips_and_failed_deletes() {
        assert!(is_warning(&ReconcileEvent::Skipped {
            id: 1,
            reason: SkipReason::UnreadableSource {
                error: "bad".into()
            },
        }));
        assert!(is_warning(&changed(RecordChange::OrphanDeleteFailed {
            file: "a-1x1.jpg".into(),
            error: "permission denied".into(),
        })));
        assert!(!is_warning(&changed(RecordChange::OrphanDeleted {
            file: "a-1x1.jpg".into(),
        })));
        assert!(!is_warning(&ReconcileEvent::PageCompleted { processed: 1 }));
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    #[test]
    fn summary_lines() {
        let quiet = ReconcileSummary {
            processed: 3,
            ..Default::default()
        };
        assert_eq!(format_summary(&quiet).len(), 1);

        let busy = ReconcileSummary {
            processed: 3,
            mime_corrected: 1,
            attached_file_written: 2,
            ..Default::default()
        };
        let lines = format_summary(&busy);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "    1 mime types corrected, 2 _attached_file rows written");
    }

    #[test]
    fn audit_lines() {
        let report = AuditReport {
            unused: vec!["a".into()],
            missing: vec![],
            records: 10,
            unparseable: 2,
        };
        let lines = format_audit(&report, &[PathBuf::from("image-unused.log")]);
        assert_eq!(
            lines,
            vec![
                "Audited 10 records: 1 unused, 0 missing".to_string(),
                "    2 records unparseable".to_string(),
                "    \u{2192} image-unused.log".to_string(),
            ]
        );
    }
}
