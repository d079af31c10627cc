//! # rethumb
//!
//! Keeps a media library's derivative images (thumbnails and other resized
//! copies) consistent with a configured size policy. Three sources of truth
//! are compared for every image attachment:
//!
//! ```text
//! size policy (rethumb.toml)   what derivatives every image should have
//! metadata store (SQLite)      what the library believes exists
//! media tree (disk)            what actually exists
//! ```
//!
//! The disk wins for facts (dimensions, existence), the policy wins for
//! intent, and the metadata record is rewritten to match both.
//!
//! # Pipeline per Attachment
//!
//! ```text
//! 1. Validate   locator → relative path, MIME from extension, file exists
//! 2. Normalize  fix root fields, drop invalid derivative entries
//! 3. Synthesize render missing sizes, delete orphan files
//! 4. Persist    write the record only if its JSON changed
//! ```
//!
//! Step 4 makes runs idempotent: a reconciled library produces no writes, so
//! an interrupted run can simply be started again.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`reconcile`] | Driver: pagination, per-item validation, events, persistence |
//! | [`normalize`] | Root correction and the eight per-entry validity checks |
//! | [`synthesize`] | Missing-size rendering and orphan deletion |
//! | [`metadata`] | Typed `_attachment_metadata` record with passthrough fields |
//! | [`store`] | [`store::MetadataStore`] trait and its SQLite implementation |
//! | [`imaging`] | Resize geometry, image backend trait, `image`-crate backend |
//! | [`naming`] | `<stem>-<w>x<h><ext>` derivative filename rule |
//! | [`scan`] | Same-stem sibling listing for orphan candidates |
//! | [`audit`] | Library-wide unused/missing image report |
//! | [`config`] | `rethumb.toml` loading, merging, validation |
//! | [`output`] | One-line event formatting for the CLI |
//! | [`types`] | Size policy and attachment types shared across modules |
//!
//! # Design Decisions
//!
//! ## Metadata Record Is Typed, Not Patched
//!
//! The stored JSON is deserialized into [`metadata::AttachmentMetadata`]
//! once, corrected in memory, and serialized back. Unknown fields ride along
//! in a flattened map so nothing the tool does not understand is lost.
//!
//! ## Orphans Need Two Signals
//!
//! A sibling file is deleted only if no surviving entry references it *and*
//! its name has the exact `<stem>-<digits>x<digits><ext>` shape. Same-stem
//! files with any other suffix (`photo-edited.jpg`) are never touched.
//!
//! ## Atomic Derivative Writes
//!
//! Derivatives are encoded to a scratch file in the target directory and
//! renamed into place, so a web server never serves a half-written image.

pub mod audit;
pub mod config;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod normalize;
pub mod output;
pub mod reconcile;
pub mod scan;
pub mod store;
pub mod synthesize;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
