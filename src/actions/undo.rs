//! Single-level undo of the most recent logged operation.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::execute::{move_path, ActionError};
use crate::model::{Operation, OperationKind};
use crate::store::{Store, StoreError};

/// Errors from [`undo_last`].
#[derive(Debug, Error)]
pub enum UndoError {
    /// The file to move back no longer exists.
    #[error("cannot undo: {0} no longer exists")]
    TargetMissing(PathBuf),

    /// Something already occupies the original location.
    #[error("cannot undo: {0} already exists")]
    DestinationOccupied(PathBuf),

    /// The operation has no inverse.
    #[error("cannot undo {kind} of {path}: operation is not reversible")]
    NotReversible { kind: OperationKind, path: PathBuf },

    /// Restoring the file failed.
    #[error("undo failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Result of a successful [`undo_last`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The log is empty.
    NothingToUndo,
    /// The operation was reversed and removed from the log.
    Undone(Operation),
    /// The operation had failed, so only its log entry was removed.
    Discarded(Operation),
}

impl UndoOutcome {
    #[must_use]
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Self::NothingToUndo => None,
            Self::Undone(op) | Self::Discarded(op) => Some(op),
        }
    }
}

/// Reverse the most recent operation in `store`'s log.
///
/// RENAME and MOVE put the file back at its source path, COPY removes the
/// copy. DELETE cannot be reversed and is left in the log.
///
/// # Errors
///
/// Returns an [`UndoError`] describing why the operation could not be
/// reversed. The log is unchanged in that case.
pub fn undo_last(store: &Store) -> Result<UndoOutcome, UndoError> {
    let Some(operation) = store.last_operation()? else {
        log::info!("Nothing to undo");
        return Ok(UndoOutcome::NothingToUndo);
    };
    let id = operation.id;

    if !operation.is_success() {
        if let Some(id) = id {
            store.delete_operation(id)?;
        }
        log::info!(
            "Discarded failed {} of {}",
            operation.kind,
            operation.source_path.display()
        );
        return Ok(UndoOutcome::Discarded(operation));
    }

    let not_reversible = || UndoError::NotReversible {
        kind: operation.kind,
        path: operation.source_path.clone(),
    };

    // After the disk is restored the entry is dropped before file records change
    let forget = || -> Result<(), StoreError> {
        if let Some(id) = id {
            store.delete_operation(id)?;
        }
        Ok(())
    };

    match operation.kind {
        OperationKind::Rename | OperationKind::Move => {
            let dest = operation.dest_path.as_deref().ok_or_else(not_reversible)?;
            let source = operation.source_path.as_path();
            if fs::symlink_metadata(dest).is_err() {
                return Err(UndoError::TargetMissing(dest.to_path_buf()));
            }
            if fs::symlink_metadata(source).is_ok() {
                return Err(UndoError::DestinationOccupied(source.to_path_buf()));
            }
            move_path(dest, source).map_err(|e| match e {
                ActionError::SourceMissing(path) => UndoError::TargetMissing(path),
                ActionError::TargetExists(path) => UndoError::DestinationOccupied(path),
                ActionError::Io { path, source } => UndoError::Io { path, source },
                ActionError::Storage(e) => UndoError::Storage(e),
                ActionError::InvalidName(name) => UndoError::Io {
                    path: dest.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, name),
                },
            })?;
            forget()?;
            store.rename_file(dest, source)?;
        }
        OperationKind::Copy => {
            let dest = operation.dest_path.as_deref().ok_or_else(not_reversible)?;
            match fs::remove_file(dest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Copy {} already gone", dest.display());
                }
                Err(e) => {
                    return Err(UndoError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    })
                }
            }
            forget()?;
            store.delete_file_by_path(dest)?;
        }
        OperationKind::Delete => return Err(not_reversible()),
    }

    log::info!(
        "Undid {} of {}",
        operation.kind,
        operation.source_path.display()
    );
    Ok(UndoOutcome::Undone(operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::FileActions;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        (TempDir::new().unwrap(), Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_nothing_to_undo() {
        let (_dir, store) = setup();
        assert_eq!(undo_last(&store).unwrap(), UndoOutcome::NothingToUndo);
    }

    #[test]
    fn test_undo_move_restores_file() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("moved.txt");
        fs::write(&src, b"content").unwrap();
        FileActions::new(&store, false).move_file(&src, &dest).unwrap();

        let outcome = undo_last(&store).unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone(_)));
        assert!(src.exists());
        assert!(!dest.exists());
        assert_eq!(store.operation_count().unwrap(), 0);
    }

    #[test]
    fn test_undo_move_with_missing_target() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("moved.txt");
        fs::write(&src, b"content").unwrap();
        FileActions::new(&store, false).move_file(&src, &dest).unwrap();
        fs::remove_file(&dest).unwrap();

        assert!(matches!(undo_last(&store), Err(UndoError::TargetMissing(_))));
        assert_eq!(store.operation_count().unwrap(), 1);
    }

    #[test]
    fn test_undo_move_with_occupied_source() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("moved.txt");
        fs::write(&src, b"content").unwrap();
        FileActions::new(&store, false).move_file(&src, &dest).unwrap();
        fs::write(&src, b"new occupant").unwrap();

        assert!(matches!(
            undo_last(&store),
            Err(UndoError::DestinationOccupied(_))
        ));
        assert_eq!(fs::read(&src).unwrap(), b"new occupant");
    }

    #[test]
    fn test_undo_copy_removes_copy() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let copy = dir.path().join("b.txt");
        fs::write(&src, b"content").unwrap();
        FileActions::new(&store, false).copy_file(&src, &copy).unwrap();

        undo_last(&store).unwrap();
        assert!(src.exists());
        assert!(!copy.exists());
    }

    #[test]
    fn test_delete_is_not_reversible() {
        let (dir, store) = setup();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"content").unwrap();
        FileActions::new(&store, false).delete_file(&path, None).unwrap();

        let err = undo_last(&store).unwrap_err();
        assert!(matches!(
            err,
            UndoError::NotReversible {
                kind: OperationKind::Delete,
                ..
            }
        ));
        assert_eq!(store.operation_count().unwrap(), 1);
    }

    #[test]
    fn test_failed_operation_is_discarded() {
        let (dir, store) = setup();
        let missing = dir.path().join("missing.txt");
        let _ = FileActions::new(&store, false).move_file(&missing, &dir.path().join("x"));

        let outcome = undo_last(&store).unwrap();
        assert!(matches!(outcome, UndoOutcome::Discarded(_)));
        assert_eq!(store.operation_count().unwrap(), 0);
    }
}
