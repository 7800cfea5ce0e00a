//! The append-only operation log.

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use std::path::PathBuf;

use super::{from_millis, path_to_sql, to_millis, Store, StoreError};
use crate::model::{Operation, OperationKind, OperationStatus};

const OPERATION_SELECT: &str =
    "SELECT id, type, source_path, dest_path, timestamp, status, details FROM operations";

fn parse_column<T: std::str::FromStr>(column: usize, text: String) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<Operation> {
    let source: String = row.get(2)?;
    let dest: Option<String> = row.get(3)?;
    Ok(Operation {
        id: Some(row.get(0)?),
        kind: parse_column::<OperationKind>(1, row.get(1)?)?,
        source_path: PathBuf::from(source),
        dest_path: dest.map(PathBuf::from),
        timestamp: from_millis(4, row.get(4)?)?,
        status: parse_column::<OperationStatus>(5, row.get(5)?)?,
        details: row.get(6)?,
    })
}

impl Store {
    /// Append an operation; returns it with its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn log_operation(&self, operation: &Operation) -> Result<Operation, StoreError> {
        let id: i64 = self.conn().query_row(
            "INSERT INTO operations (type, source_path, dest_path, timestamp, status, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
            params![
                operation.kind.as_str(),
                path_to_sql(&operation.source_path),
                operation.dest_path.as_deref().map(path_to_sql),
                to_millis(&operation.timestamp),
                operation.status.as_str(),
                operation.details,
            ],
            |row| row.get(0),
        )?;
        log::debug!(
            "Logged {} {} ({})",
            operation.kind,
            operation.source_path.display(),
            operation.status
        );
        Ok(Operation {
            id: Some(id),
            ..operation.clone()
        })
    }

    /// Up to `limit` operations, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn operations(&self, limit: usize) -> Result<Vec<Operation>, StoreError> {
        let sql = format!("{OPERATION_SELECT} ORDER BY timestamp DESC, id DESC LIMIT ?1");
        let mut stmt = self.conn().prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], operation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The most recent operation; ties on timestamp go to the later insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_operation(&self) -> Result<Option<Operation>, StoreError> {
        let sql = format!("{OPERATION_SELECT} ORDER BY timestamp DESC, id DESC LIMIT 1");
        Ok(self
            .conn()
            .query_row(&sql, [], operation_from_row)
            .optional()?)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_operation(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self
            .conn()
            .execute("DELETE FROM operations WHERE id = ?1", [id])?
            > 0)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn operation_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))?)
    }
}
