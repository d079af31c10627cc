//! Metadata store: attachment rows and their key/value attributes.
//!
//! The reconciler talks to the store only through [`MetadataStore`];
//! [`SqliteStore`] is the bundled implementation.
//!
//! ## Schema
//!
//! ```sql
//! attachments(id INTEGER PRIMARY KEY, locator TEXT, mime_type TEXT)
//! attachment_attributes(id INTEGER PRIMARY KEY, attachment_id INTEGER, key TEXT, value TEXT)
//! ```
//!
//! Attributes are not unique per `(attachment_id, key)` at the schema level.
//! Duplicates exist in real libraries; [`MetadataStore::get_attributes`]
//! reports them instead of guessing which row is right.

use crate::types::{Attachment, AttachmentId};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("found {found} attribute rows where at most {expected} were expected")]
    AmbiguousAttributes { found: usize, expected: usize },
}

/// Whether an upsert created a row or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// One attribute row, as returned by [`MetadataStore::list_attribute_values`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    /// Row id; the pagination cursor.
    pub id: i64,
    pub attachment_id: AttachmentId,
    pub value: String,
}

/// Operations the reconciler and the audit need from a metadata store.
pub trait MetadataStore {
    /// Attachments with `id > after_id`, ascending by id, at most `limit` rows.
    /// An empty page means enumeration is complete.
    fn list_attachments(
        &self,
        after_id: AttachmentId,
        limit: usize,
    ) -> Result<Vec<Attachment>, StoreError>;

    /// Values of the named attributes for one attachment, keyed by attribute
    /// key. Absent keys are simply missing from the map.
    ///
    /// Fails with [`StoreError::AmbiguousAttributes`] when more rows come back
    /// than keys were asked for.
    fn get_attributes(
        &self,
        attachment_id: AttachmentId,
        keys: &[&str],
    ) -> Result<BTreeMap<String, String>, StoreError>;

    /// Insert the attribute if absent, else overwrite its value.
    fn upsert_attribute(
        &self,
        attachment_id: AttachmentId,
        key: &str,
        value: &str,
    ) -> Result<Upsert, StoreError>;

    fn update_mime_type(
        &self,
        attachment_id: AttachmentId,
        mime_type: &str,
    ) -> Result<(), StoreError>;

    /// Every value stored under `key`, paged by attribute row id.
    fn list_attribute_values(
        &self,
        key: &str,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttributeRow>, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attachments (
    id          INTEGER PRIMARY KEY,
    locator     TEXT NOT NULL,
    mime_type   TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS attachment_attributes (
    id              INTEGER PRIMARY KEY,
    attachment_id   INTEGER NOT NULL,
    key             TEXT NOT NULL,
    value           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attachment_attributes_lookup
    ON attachment_attributes(attachment_id, key);
";

/// SQLite-backed [`MetadataStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database. Fails if the file does not exist; use
    /// [`SqliteStore::create`] (the `init-db` command) to make one.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        Ok(Self { conn })
    }

    /// Open or create a database and make sure the schema exists.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Fresh in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Add an attachment row, returning its id.
    pub fn insert_attachment(&self, locator: &str, mime_type: &str) -> Result<AttachmentId, StoreError> {
        self.conn.execute(
            "INSERT INTO attachments (locator, mime_type) VALUES (?1, ?2)",
            params![locator, mime_type],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Add an attribute row unconditionally, duplicates included.
    pub fn insert_attribute(
        &self,
        attachment_id: AttachmentId,
        key: &str,
        value: &str,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO attachment_attributes (attachment_id, key, value) VALUES (?1, ?2, ?3)",
            params![attachment_id, key, value],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_attachment(&self, id: AttachmentId) -> Result<Option<Attachment>, StoreError> {
        let attachment = self
            .conn
            .query_row(
                "SELECT id, locator, mime_type FROM attachments WHERE id = ?1",
                [id],
                row_to_attachment,
            )
            .optional()?;
        Ok(attachment)
    }

    /// Number of attribute rows stored under `key` for one attachment.
    pub fn count_attributes(&self, attachment_id: AttachmentId, key: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attachment_attributes WHERE attachment_id = ?1 AND key = ?2",
            params![attachment_id, key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    let locator: String = row.get(1)?;
    let mime_type: String = row.get(2)?;
    Ok(Attachment {
        id: row.get(0)?,
        locator: locator.trim().to_string(),
        mime_type: mime_type.trim().to_string(),
    })
}

impl MetadataStore for SqliteStore {
    fn list_attachments(
        &self,
        after_id: AttachmentId,
        limit: usize,
    ) -> Result<Vec<Attachment>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, locator, mime_type FROM attachments
             WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after_id, limit as i64], row_to_attachment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_attributes(
        &self,
        attachment_id: AttachmentId,
        keys: &[&str],
    ) -> Result<BTreeMap<String, String>, StoreError> {
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }
        let placeholders = (0..keys.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT key, value FROM attachment_attributes
             WHERE attachment_id = ?1 AND key IN ({placeholders}) ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bind: Vec<rusqlite::types::Value> = std::iter::once(attachment_id.into())
            .chain(keys.iter().map(|k| k.to_string().into()))
            .collect();
        let rows = stmt
            .query_map(params_from_iter(bind), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.len() > keys.len() {
            return Err(StoreError::AmbiguousAttributes {
                found: rows.len(),
                expected: keys.len(),
            });
        }
        Ok(rows
            .into_iter()
            .map(|(key, value)| (key, value.trim().to_string()))
            .collect())
    }

    fn upsert_attribute(
        &self,
        attachment_id: AttachmentId,
        key: &str,
        value: &str,
    ) -> Result<Upsert, StoreError> {
        let updated = self.conn.execute(
            "UPDATE attachment_attributes SET value = ?3 WHERE attachment_id = ?1 AND key = ?2",
            params![attachment_id, key, value],
        )?;
        if updated > 0 {
            return Ok(Upsert::Updated);
        }
        self.insert_attribute(attachment_id, key, value)?;
        Ok(Upsert::Inserted)
    }

    fn update_mime_type(
        &self,
        attachment_id: AttachmentId,
        mime_type: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE attachments SET mime_type = ?2 WHERE id = ?1",
            params![attachment_id, mime_type],
        )?;
        Ok(())
    }

    fn list_attribute_values(
        &self,
        key: &str,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttributeRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, attachment_id, value FROM attachment_attributes
             WHERE key = ?1 AND id > ?2 ORDER BY id ASC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![key, after_id, limit as i64], |row| {
                let value: String = row.get(2)?;
                Ok(AttributeRow {
                    id: row.get(0)?,
                    attachment_id: row.get(1)?,
                    value: value.trim().to_string(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    #[test]
    fn list_attachments_pages_by_id() {
        let s = store();
        for i in 0..5 {
            s.insert_attachment(&format!("http://x/{i}.jpg"), "image/jpeg")
                .unwrap();
        }

        let first = s.list_attachments(0, 2).unwrap();
        assert_eq!(first.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
        let second = s.list_attachments(2, 2).unwrap();
        assert_eq!(second.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 4]);
        let third = s.list_attachments(4, 2).unwrap();
        assert_eq!(third.len(), 1);
        assert!(s.list_attachments(5, 2).unwrap().is_empty());
    }

    #[test]
    fn attachment_fields_trimmed() {
        let s = store();
        let id = s
            .insert_attachment("  http://x/a.jpg\n", " image/jpeg ")
            .unwrap();
        let a = s.get_attachment(id).unwrap().unwrap();
        assert_eq!(a.locator, "http://x/a.jpg");
        assert_eq!(a.mime_type, "image/jpeg");
    }

    #[test]
    fn update_mime_type_persists() {
        let s = store();
        let id = s.insert_attachment("http://x/a.png", "image/jpeg").unwrap();
        s.update_mime_type(id, "image/png").unwrap();
        assert_eq!(s.get_attachment(id).unwrap().unwrap().mime_type, "image/png");
    }

    #[test]
    fn get_missing_attachment_is_none() {
        assert!(store().get_attachment(42).unwrap().is_none());
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn get_attributes_returns_requested_keys_only() {
        let s = store();
        let id = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        s.insert_attribute(id, "_attached_file", "a.jpg").unwrap();
        s.insert_attribute(id, "_edit_lock", "1").unwrap();

        let attrs = s
            .get_attributes(id, &["_attached_file", "_attachment_metadata"])
            .unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["_attached_file"], "a.jpg");
    }

    #[test]
    fn get_attributes_scoped_to_attachment() {
        let s = store();
        let a = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        let b = s.insert_attachment("http://x/b.jpg", "image/jpeg").unwrap();
        s.insert_attribute(b, "_attached_file", "b.jpg").unwrap();

        assert!(s.get_attributes(a, &["_attached_file"]).unwrap().is_empty());
    }

    #[test]
    fn get_attributes_too_many_rows_is_ambiguous() {
        let s = store();
        let id = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        s.insert_attribute(id, "_attached_file", "a.jpg").unwrap();
        s.insert_attribute(id, "_attachment_metadata", "{}").unwrap();
        s.insert_attribute(id, "_attachment_metadata", "{}").unwrap();

        let err = s
            .get_attributes(id, &["_attached_file", "_attachment_metadata"])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AmbiguousAttributes {
                found: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn attribute_values_trimmed() {
        let s = store();
        let id = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        s.insert_attribute(id, "_attached_file", " a.jpg \n").unwrap();
        let attrs = s.get_attributes(id, &["_attached_file"]).unwrap();
        assert_eq!(attrs["_attached_file"], "a.jpg");
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let s = store();
        let id = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();

        assert_eq!(
            s.upsert_attribute(id, "_attached_file", "a.jpg").unwrap(),
            Upsert::Inserted
        );
        assert_eq!(
            s.upsert_attribute(id, "_attached_file", "2020/01/a.jpg").unwrap(),
            Upsert::Updated
        );
        assert_eq!(s.count_attributes(id, "_attached_file").unwrap(), 1);
        assert_eq!(
            s.get_attributes(id, &["_attached_file"]).unwrap()["_attached_file"],
            "2020/01/a.jpg"
        );
    }

    #[test]
    fn list_attribute_values_pages_by_row_id() {
        let s = store();
        let a = s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        let b = s.insert_attachment("http://x/b.jpg", "image/jpeg").unwrap();
        s.insert_attribute(a, "_attachment_metadata", "{\"file\":\"a.jpg\"}")
            .unwrap();
        s.insert_attribute(a, "_attached_file", "a.jpg").unwrap();
        s.insert_attribute(b, "_attachment_metadata", "{\"file\":\"b.jpg\"}")
            .unwrap();

        let page = s.list_attribute_values("_attachment_metadata", 0, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].attachment_id, a);
        let next = s
            .list_attribute_values("_attachment_metadata", page[0].id, 10)
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].attachment_id, b);
        assert!(s
            .list_attribute_values("_attachment_metadata", next[0].id, 10)
            .unwrap()
            .is_empty());
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[test]
    fn open_requires_existing_database() {
        let tmp = TempDir::new().unwrap();
        assert!(SqliteStore::open(&tmp.path().join("missing.db")).is_err());
    }

    #[test]
    fn create_then_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("media.db");
        {
            let s = SqliteStore::create(&path).unwrap();
            s.insert_attachment("http://x/a.jpg", "image/jpeg").unwrap();
        }
        let s = SqliteStore::open(&path).unwrap();
        assert_eq!(s.list_attachments(0, 10).unwrap().len(), 1);
        // Schema creation is idempotent.
        SqliteStore::create(&path).unwrap();
    }
}
