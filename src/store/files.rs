//! File records and their hashes.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{from_millis, path_to_sql, to_millis, Store, StoreError};
use crate::model::{FileRecord, Hashes};

const FILE_COLUMNS: &str = "id, path, size, mtime, is_directory";

pub(crate) fn file_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(offset + 1)?;
    Ok(FileRecord {
        id: row.get(offset)?,
        path: PathBuf::from(path),
        size: row.get(offset + 2)?,
        modified_at: from_millis(offset + 3, row.get(offset + 3)?)?,
        is_directory: row.get(offset + 4)?,
    })
}

/// Insert or update one record inside the caller's transaction.
///
/// Stored hashes are discarded when size or mtime changed, since they no
/// longer describe the file's content.
pub(crate) fn upsert_in(conn: &Connection, record: &FileRecord) -> rusqlite::Result<FileRecord> {
    let path = path_to_sql(&record.path);
    let mtime = to_millis(&record.modified_at);

    let previous: Option<(u64, i64)> = conn
        .query_row(
            "SELECT size, mtime FROM files WHERE path = ?1",
            [&path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let id: i64 = conn.query_row(
        "INSERT INTO files (path, size, mtime, is_directory) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(path) DO UPDATE SET
             size = excluded.size,
             mtime = excluded.mtime,
             is_directory = excluded.is_directory
         RETURNING id",
        params![path, record.size, mtime, record.is_directory],
        |row| row.get(0),
    )?;

    if let Some((size, old_mtime)) = previous {
        if size != record.size || old_mtime != mtime {
            log::trace!("Content changed, dropping hashes: {}", record.path.display());
            conn.execute("DELETE FROM file_hashes WHERE file_id = ?1", [id])?;
        }
    }

    Ok(record.clone().with_id(id))
}

impl Store {
    /// Insert a file record, or update size/mtime/is_directory in place if
    /// its path is already known. The returned record carries the store id,
    /// which is preserved across re-upserts.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_file(&self, record: &FileRecord) -> Result<FileRecord, StoreError> {
        Ok(upsert_in(self.conn(), record)?)
    }

    /// Upsert many records in a single transaction; nothing is written if
    /// any record fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the transaction is rolled back.
    pub fn upsert_files(&self, records: &[FileRecord]) -> Result<Vec<FileRecord>, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let saved = records
            .iter()
            .map(|record| upsert_in(&tx, record))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(saved)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file_by_path(&self, path: &Path) -> Result<Option<FileRecord>, StoreError> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [path_to_sql(path)], |row| file_from_row(row, 0))
            .optional()?)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRecord>, StoreError> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [id], |row| file_from_row(row, 0))
            .optional()?)
    }

    /// All non-directory records of exactly `size` bytes, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn files_by_size(&self, size: u64) -> Result<Vec<FileRecord>, StoreError> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE size = ?1 AND is_directory = 0 ORDER BY id"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([size], |row| file_from_row(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every record in insertion (id) order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], |row| file_from_row(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a record by id; hashes and group memberships cascade.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_file(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.conn().execute("DELETE FROM files WHERE id = ?1", [id])? > 0)
    }

    /// Delete a record by path; hashes and group memberships cascade.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_file_by_path(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self
            .conn()
            .execute("DELETE FROM files WHERE path = ?1", [path_to_sql(path)])?
            > 0)
    }

    /// Point the record at `from` to `to`, keeping its id, hashes and group
    /// memberships. Returns whether a record was updated.
    ///
    /// A record already stored under `to` is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails; nothing is changed.
    pub fn rename_file(&self, from: &Path, to: &Path) -> Result<bool, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let to_sql = path_to_sql(to);
        tx.execute("DELETE FROM files WHERE path = ?1", [&to_sql])?;
        let updated = tx.execute(
            "UPDATE files SET path = ?1 WHERE path = ?2",
            [&to_sql, &path_to_sql(from)],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?)
    }

    /// Store the hashes of a saved file, replacing any previous ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRow`] if the record has no id, or an
    /// error if the write fails.
    pub fn save_hashes(&self, file: &FileRecord, hashes: &Hashes) -> Result<(), StoreError> {
        save_hashes_in(self.conn(), file, hashes)
    }

    /// Store many hashes in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the transaction is rolled back.
    pub fn save_hashes_batch(&self, entries: &[(FileRecord, Hashes)]) -> Result<(), StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        for (file, hashes) in entries {
            save_hashes_in(&tx, file, hashes)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn hashes_for(&self, file_id: i64) -> Result<Option<Hashes>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT fast, strong FROM file_hashes WHERE file_id = ?1",
                [file_id],
                |row| {
                    Ok(Hashes {
                        fast: row.get(0)?,
                        strong: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }
}

fn save_hashes_in(conn: &Connection, file: &FileRecord, hashes: &Hashes) -> Result<(), StoreError> {
    if !file.has_id() {
        return Err(StoreError::InvalidRow(format!(
            "cannot save hashes for unsaved file {}",
            file.path.display()
        )));
    }
    conn.execute(
        "INSERT INTO file_hashes (file_id, fast, strong) VALUES (?1, ?2, ?3)
         ON CONFLICT(file_id) DO UPDATE SET fast = excluded.fast, strong = excluded.strong",
        params![file.id, hashes.fast, hashes.strong],
    )?;
    Ok(())
}
