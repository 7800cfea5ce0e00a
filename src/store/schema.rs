//! Schema definition and version migrations.
//!
//! The version lives in `PRAGMA user_version`. A fresh database reads 0.

use rusqlite::Connection;

use super::StoreError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Version 1 schema.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    mtime INTEGER NOT NULL,          -- epoch milliseconds
    is_directory INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);

CREATE TABLE IF NOT EXISTS file_hashes (
    file_id INTEGER PRIMARY KEY,
    fast TEXT NOT NULL,
    strong TEXT,
    FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_file_hashes_fast ON file_hashes(fast);

CREATE TABLE IF NOT EXISTS duplicate_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fast TEXT NOT NULL,
    size INTEGER NOT NULL,
    created_at INTEGER NOT NULL      -- epoch milliseconds
);

CREATE INDEX IF NOT EXISTS idx_duplicate_groups_fast ON duplicate_groups(fast);

-- position keeps scan insertion order of members
CREATE TABLE IF NOT EXISTS duplicate_members (
    group_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (group_id, file_id),
    FOREIGN KEY (group_id) REFERENCES duplicate_groups(id) ON DELETE CASCADE,
    FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_duplicate_members_file ON duplicate_members(file_id);

CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    source_path TEXT NOT NULL,
    dest_path TEXT,
    timestamp INTEGER NOT NULL,      -- epoch milliseconds
    status TEXT NOT NULL,
    details TEXT
);

CREATE INDEX IF NOT EXISTS idx_operations_timestamp ON operations(timestamp);
"#;

/// Ordered migrations; entry `i` upgrades version `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[SCHEMA_V1];

/// Read the stored schema version.
pub fn user_version(conn: &Connection) -> Result<u32, StoreError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the database up to [`SCHEMA_VERSION`].
///
/// Each step runs in its own transaction together with the version stamp,
/// so a failed step leaves the previous version intact.
///
/// # Errors
///
/// Returns [`StoreError::UnsupportedVersion`] without touching the database
/// when it was written by a newer build.
pub fn migrate(conn: &Connection) -> Result<u32, StoreError> {
    let found = user_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    for version in found..SCHEMA_VERSION {
        log::debug!("Migrating store schema {} -> {}", version, version + 1);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(MIGRATIONS[version as usize])?;
        tx.pragma_update(None, "user_version", version + 1)?;
        tx.commit()?;
    }

    Ok(found)
}
