//! Library-wide orphan audit.
//!
//! Compares every image path the metadata store knows about against every
//! image file under the media root and reports both differences. Nothing is
//! deleted; the unused list comes with a bash script that moves those files
//! aside for review.
//!
//! ## Sets
//!
//! - **Referenced**: for each `_attachment_metadata` record, its `file` (when
//!   it is an image by extension) plus `<dir of file>/<entry file>` for every
//!   size entry.
//! - **On disk**: files under the media root whose relative path starts with a
//!   `YYYY/MM` directory pair and has an image extension.
//!
//! ## Reports
//!
//! ```text
//! image-unused.log       on disk, not referenced (absolute paths)
//! image-missing.log      referenced, not on disk (absolute paths)
//! image-unused-move.sh   mkdir -p + mv for every unused file
//! ```

use crate::imaging::ImageKind;
use crate::metadata::{ATTACHMENT_METADATA_KEY, AttachmentMetadata};
use crate::store::{MetadataStore, StoreError};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

pub const UNUSED_LOG: &str = "image-unused.log";
pub const MISSING_LOG: &str = "image-missing.log";
pub const MOVE_SCRIPT: &str = "image-unused-move.sh";

/// Where the generated script moves unused files when no destination is given.
pub const DEFAULT_MOVE_DESTINATION: &str = "/tmp/rethumb-unused/";

/// `YYYY/MM` prefix; only the leading digits are checked.
static UPLOAD_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}/[0-9]{2}").expect("valid upload dir regex"));

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to walk media root: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result of comparing store references with the media tree.
/// Paths are relative to the media root, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub unused: Vec<String>,
    pub missing: Vec<String>,
    /// Records read from the store.
    pub records: usize,
    /// Records skipped because they did not parse.
    pub unparseable: usize,
}

/// Image paths referenced by one metadata record.
pub fn record_references(record: &AttachmentMetadata) -> Vec<String> {
    if ImageKind::from_filename(&record.file).is_none() {
        return Vec::new();
    }
    let dir = match record.file.rfind('/') {
        Some(idx) => &record.file[..=idx],
        None => "",
    };
    std::iter::once(record.file.clone())
        .chain(record.derivative_files().map(|f| format!("{dir}{f}")))
        .collect()
}

/// Every image path referenced by any metadata record in the store.
pub fn referenced_files(
    store: &impl MetadataStore,
    page_size: usize,
) -> Result<(BTreeSet<String>, usize, usize), AuditError> {
    let mut referenced = BTreeSet::new();
    let mut records = 0;
    let mut unparseable = 0;
    let mut after_id = 0;

    loop {
        let page = store.list_attribute_values(ATTACHMENT_METADATA_KEY, after_id, page_size.max(1))?;
        if page.is_empty() {
            break;
        }
        for row in &page {
            records += 1;
            after_id = row.id;
            match AttachmentMetadata::parse(&row.value) {
                Ok(record) => referenced.extend(record_references(&record)),
                Err(e) => {
                    unparseable += 1;
                    tracing::debug!(attachment = row.attachment_id, error = %e, "unparseable metadata");
                }
            }
        }
        tracing::info!("{records} attachment records read");
    }

    Ok((referenced, records, unparseable))
}

/// Relative paths of every upload image under `media_root`.
pub fn files_on_disk(media_root: &Path) -> Result<BTreeSet<String>, AuditError> {
    let mut found = BTreeSet::new();
    for entry in WalkDir::new(media_root).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(media_root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if UPLOAD_DIR.is_match(&relative) && ImageKind::from_filename(&relative).is_some() {
            found.insert(relative);
        }
    }
    Ok(found)
}

/// Build the report from the two sets.
pub fn compare(referenced: &BTreeSet<String>, on_disk: &BTreeSet<String>) -> AuditReport {
    AuditReport {
        unused: on_disk.difference(referenced).cloned().collect(),
        missing: referenced.difference(on_disk).cloned().collect(),
        ..Default::default()
    }
}

/// Run the full audit.
pub fn audit(
    store: &impl MetadataStore,
    media_root: &Path,
    page_size: usize,
) -> Result<AuditReport, AuditError> {
    let (referenced, records, unparseable) = referenced_files(store, page_size)?;
    tracing::info!(root = %media_root.display(), "scanning media root");
    let on_disk = files_on_disk(media_root)?;
    Ok(AuditReport {
        records,
        unparseable,
        ..compare(&referenced, &on_disk)
    })
}

/// Escape text for use inside a double-quoted bash string.
fn bash_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bash script moving every unused file from `media_root` to `destination`,
/// keeping the relative directory layout.
pub fn move_script(unused: &[String], media_root: &Path, destination: &Path) -> String {
    let with_slash = |p: &Path| {
        let s = p.to_string_lossy().into_owned();
        if s.ends_with('/') { s } else { format!("{s}/") }
    };
    let mut script = format!(
        "#!/bin/bash\n\nSOURCE_IMAGE_DIR=\"{}\"\nDEST_UNUSED_IMAGE_DIR=\"{}\"\n\n",
        bash_escape(&with_slash(media_root)),
        bash_escape(&with_slash(destination)),
    );

    let mut seen_dirs = HashSet::new();
    for file in unused {
        let dir = match file.rfind('/') {
            Some(idx) => &file[..idx],
            None => ".",
        };
        let dir = bash_escape(dir);
        if seen_dirs.insert(dir.clone()) {
            script.push_str(&format!("mkdir -p \"${{DEST_UNUSED_IMAGE_DIR}}{dir}\"\n"));
        }
        script.push_str(&format!(
            "mv \"${{SOURCE_IMAGE_DIR}}{}\" \"${{DEST_UNUSED_IMAGE_DIR}}{dir}\"\n",
            bash_escape(file)
        ));
    }
    script
}

fn absolute_listing(files: &[String], media_root: &Path) -> String {
    files
        .iter()
        .map(|f| format!("{}\n", media_root.join(f).display()))
        .collect()
}

/// Write the three report files into `report_dir`, returning their paths.
pub fn write_reports(
    report: &AuditReport,
    report_dir: &Path,
    media_root: &Path,
    move_to: &Path,
) -> Result<Vec<PathBuf>, AuditError> {
    fs::create_dir_all(report_dir)?;
    let unused_log = report_dir.join(UNUSED_LOG);
    let missing_log = report_dir.join(MISSING_LOG);
    let script = report_dir.join(MOVE_SCRIPT);

    fs::write(&unused_log, absolute_listing(&report.unused, media_root))?;
    fs::write(&missing_log, absolute_listing(&report.missing, media_root))?;
    fs::write(&script, move_script(&report.unused, media_root, move_to))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    }

    Ok(vec![unused_log, missing_log, script])
}
