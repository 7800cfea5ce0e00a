//! Persistent, schema-versioned store backed by SQLite.
//!
//! # Overview
//!
//! The store owns the on-disk representation of file records, their hashes,
//! duplicate groups and the operation log. Every multi-row write runs in a
//! single transaction that is rolled back on failure, so partial batches and
//! partial groups are never observable.
//!
//! A [`Store`] is owned by one logical session; it is `Send` but not `Sync`.
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::store::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("dupetrail.db")).unwrap();
//! println!("{} files recorded", store.file_count().unwrap());
//! ```

mod batch;
mod files;
mod groups;
mod operations;
pub mod schema;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use batch::{BatchSummary, BatchWriter, DEFAULT_BATCH_SIZE};
pub use schema::SCHEMA_VERSION;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer schema version.
    #[error("Store schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// A stored row could not be turned back into a model value.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// A group member is not a known file.
    #[error("Group member is not a recorded file: {0}")]
    MissingMember(PathBuf),

    /// Failed to create the directory holding the database.
    #[error("Failed to create store directory {path}: {source}")]
    Io {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Handle to an open store.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the store at `path`, creating parent directories and
    /// migrating the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedVersion`] if the file was written by
    /// a newer build, or any SQLite error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        log::debug!("Opened store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )?;
        let found = schema::user_version(&self.conn)?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        // WAL is unavailable for in-memory databases; keep the default there
        if self.path.is_some() {
            let mode: String = self
                .conn
                .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            log::trace!("Store journal mode: {}", mode);
        }

        schema::migrate(&self.conn)?;
        if found != SCHEMA_VERSION {
            log::info!(
                "Store schema upgraded from version {} to {}",
                found,
                SCHEMA_VERSION
            );
        }
        Ok(())
    }

    /// Path of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Schema version currently stamped on the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        schema::user_version(&self.conn)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn path_to_sql(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn to_millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert a stored epoch-millisecond column back to a timestamp.
pub(crate) fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}
