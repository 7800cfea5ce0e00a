//! Logged file operations.
//!
//! # Overview
//!
//! [`FileActions`] is the only path through which dupetrail changes the
//! filesystem. Every real rename, move, copy or delete appends an
//! [`Operation`] to the store's log, marked SUCCESS or FAILED with the error
//! text. In dry-run mode the planned operation is returned and nothing is
//! touched or logged.
//!
//! Rename, move and copy never overwrite an existing target.
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::actions::FileActions;
//! use dupetrail::store::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("dupetrail.db")).unwrap();
//! let actions = FileActions::new(&store, false);
//! let outcome = actions.move_file(Path::new("/tmp/a.txt"), Path::new("/tmp/b.txt")).unwrap();
//! println!("logged as #{:?}", outcome.operation.id);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{Operation, OperationKind};
use crate::store::{Store, StoreError};

/// Errors from [`FileActions`].
#[derive(Debug, Error)]
pub enum ActionError {
    /// The file to act on does not exist.
    #[error("file not found: {0}")]
    SourceMissing(PathBuf),

    /// The target already exists and would be overwritten.
    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    /// A rename target that is not a plain file name.
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    /// The filesystem operation failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Logging the operation failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ActionError {
    fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::SourceMissing(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::TargetExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether this is a per-file failure rather than a store failure.
    #[must_use]
    pub fn is_file_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The logged operation, or the planned one in dry-run mode (no id)
    pub operation: Operation,
    /// Whether the filesystem was changed
    pub performed: bool,
}

/// Executes file operations and records them in the operation log.
pub struct FileActions<'s> {
    store: &'s Store,
    dry_run: bool,
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

impl<'s> FileActions<'s> {
    #[must_use]
    pub fn new(store: &'s Store, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Rename `source` within its directory.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidName`] if `new_name` contains a path
    /// separator or is `.`/`..`, and otherwise the same errors as
    /// [`FileActions::move_file`].
    pub fn rename(&self, source: &Path, new_name: &str) -> Result<ActionOutcome, ActionError> {
        let valid = !new_name.is_empty()
            && new_name != "."
            && new_name != ".."
            && !new_name.contains(['/', '\\']);
        if !valid {
            return Err(ActionError::InvalidName(new_name.to_string()));
        }
        let dest = source
            .parent()
            .map_or_else(|| PathBuf::from(new_name), |parent| parent.join(new_name));
        self.relocate(OperationKind::Rename, source, &dest)
    }

    /// Move `source` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::SourceMissing`], [`ActionError::TargetExists`]
    /// or [`ActionError::Io`] after logging the failure, or
    /// [`ActionError::Storage`] if logging fails.
    pub fn move_file(&self, source: &Path, dest: &Path) -> Result<ActionOutcome, ActionError> {
        self.relocate(OperationKind::Move, source, dest)
    }

    fn relocate(
        &self,
        kind: OperationKind,
        source: &Path,
        dest: &Path,
    ) -> Result<ActionOutcome, ActionError> {
        let planned = Operation::succeeded(kind, source.to_path_buf(), Some(dest.to_path_buf()));
        if self.dry_run {
            log::info!("[dry run] {} {} -> {}", kind, source.display(), dest.display());
            return Ok(ActionOutcome {
                operation: planned,
                performed: false,
            });
        }

        let result = if !exists(source) {
            Err(ActionError::SourceMissing(source.to_path_buf()))
        } else if exists(dest) {
            Err(ActionError::TargetExists(dest.to_path_buf()))
        } else {
            move_path(source, dest)
        };

        self.finish(planned, result, |store| {
            store.rename_file(source, dest)?;
            Ok(())
        })
    }

    /// Copy `source` to a new file at `dest`.
    ///
    /// # Errors
    ///
    /// Same as [`FileActions::move_file`].
    pub fn copy_file(&self, source: &Path, dest: &Path) -> Result<ActionOutcome, ActionError> {
        let planned = Operation::succeeded(
            OperationKind::Copy,
            source.to_path_buf(),
            Some(dest.to_path_buf()),
        );
        if self.dry_run {
            log::info!("[dry run] COPY {} -> {}", source.display(), dest.display());
            return Ok(ActionOutcome {
                operation: planned,
                performed: false,
            });
        }

        let result = copy_new(source, dest);
        self.finish(planned, result, |_| Ok(()))
    }

    /// Delete the file at `path`; `details` is stored with the operation.
    ///
    /// The file's record is removed from the store and groups left with a
    /// single member are pruned.
    ///
    /// # Errors
    ///
    /// Same as [`FileActions::move_file`].
    pub fn delete_file(
        &self,
        path: &Path,
        details: Option<&str>,
    ) -> Result<ActionOutcome, ActionError> {
        let planned = Operation {
            details: details.map(str::to_string),
            ..Operation::succeeded(OperationKind::Delete, path.to_path_buf(), None)
        };
        if self.dry_run {
            log::info!("[dry run] DELETE {}", path.display());
            return Ok(ActionOutcome {
                operation: planned,
                performed: false,
            });
        }

        let result = fs::remove_file(path).map_err(|e| ActionError::io(path, e));
        self.finish(planned, result, |store| {
            store.delete_file_by_path(path)?;
            store.prune_groups()?;
            Ok(())
        })
    }

    /// Log the outcome; on success then apply `sync` to the store.
    ///
    /// The log row is written first so a performed action stays undoable
    /// even when updating the file records fails.
    fn finish<F>(
        &self,
        planned: Operation,
        result: Result<(), ActionError>,
        sync: F,
    ) -> Result<ActionOutcome, ActionError>
    where
        F: FnOnce(&Store) -> Result<(), StoreError>,
    {
        match result {
            Ok(()) => {
                log::info!("{} {}", planned.kind, planned.source_path.display());
                let operation = self.store.log_operation(&planned)?;
                if let Err(e) = sync(self.store) {
                    log::warn!(
                        "{} of {} is logged but its file records are stale: {}",
                        planned.kind,
                        planned.source_path.display(),
                        e
                    );
                    return Err(e.into());
                }
                Ok(ActionOutcome {
                    operation,
                    performed: true,
                })
            }
            Err(err) => {
                log::warn!(
                    "{} {} failed: {}",
                    planned.kind,
                    planned.source_path.display(),
                    err
                );
                let failed = Operation::failed(
                    planned.kind,
                    planned.source_path,
                    planned.dest_path,
                    err.to_string(),
                );
                self.store.log_operation(&failed)?;
                Err(err)
            }
        }
    }
}

/// Move a file, falling back to copy and remove across filesystems.
pub(crate) fn move_path(source: &Path, dest: &Path) -> Result<(), ActionError> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} and {} are on different filesystems, copying",
                source.display(),
                dest.display()
            );
            copy_then_remove(source, dest)
        }
        Err(e) => Err(ActionError::io(source, e)),
    }
}

fn copy_then_remove(source: &Path, dest: &Path) -> Result<(), ActionError> {
    let metadata = fs::symlink_metadata(source).map_err(|e| ActionError::io(source, e))?;
    if !metadata.is_file() {
        return Err(ActionError::Io {
            path: source.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "only regular files can be moved across filesystems",
            ),
        });
    }
    copy_new(source, dest)?;
    if let Err(e) = fs::remove_file(source) {
        // Leave exactly one copy behind
        let _ = fs::remove_file(dest);
        return Err(ActionError::io(source, e));
    }
    Ok(())
}

/// Copy into a file that must not exist yet.
fn copy_new(source: &Path, dest: &Path) -> Result<(), ActionError> {
    let mut reader = fs::File::open(source).map_err(|e| ActionError::io(source, e))?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| ActionError::io(dest, e))?;
    if let Err(e) = io::copy(&mut reader, &mut writer) {
        drop(writer);
        // Do not leave a truncated copy behind
        let _ = fs::remove_file(dest);
        return Err(ActionError::io(dest, e));
    }
    if let Ok(permissions) = fs::metadata(source).map(|m| m.permissions()) {
        if let Err(e) = fs::set_permissions(dest, permissions) {
            log::debug!("Could not copy permissions to {}: {}", dest.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationStatus;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        (TempDir::new().unwrap(), Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_move_logs_success() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        fs::write(&src, b"hello").unwrap();

        let outcome = FileActions::new(&store, false).move_file(&src, &dest).unwrap();
        assert!(outcome.performed);
        assert!(outcome.operation.id.is_some());
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"hello");

        let last = store.last_operation().unwrap().unwrap();
        assert_eq!(last.kind, OperationKind::Move);
        assert_eq!(last.dest_path.as_deref(), Some(dest.as_path()));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"x").unwrap();

        let actions = FileActions::new(&store, true);
        let outcome = actions.delete_file(&src, Some("duplicate")).unwrap();
        assert!(!outcome.performed);
        assert_eq!(outcome.operation.id, None);
        assert_eq!(outcome.operation.details.as_deref(), Some("duplicate"));
        actions.move_file(&src, &dir.path().join("b")).unwrap();

        assert!(src.exists());
        assert_eq!(store.operation_count().unwrap(), 0);
    }

    #[test]
    fn test_refuses_to_overwrite_and_logs_failure() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        fs::write(&src, b"source").unwrap();
        fs::write(&dest, b"existing").unwrap();

        let actions = FileActions::new(&store, false);
        assert!(matches!(
            actions.move_file(&src, &dest),
            Err(ActionError::TargetExists(_))
        ));
        assert!(matches!(
            actions.copy_file(&src, &dest),
            Err(ActionError::TargetExists(_))
        ));
        assert_eq!(fs::read(&dest).unwrap(), b"existing");

        let last = store.last_operation().unwrap().unwrap();
        assert_eq!(last.status, OperationStatus::Failed);
        assert!(last.details.unwrap().contains("already exists"));
        assert_eq!(store.operation_count().unwrap(), 2);
    }

    #[test]
    fn test_rename_within_directory() {
        let (dir, store) = setup();
        let src = dir.path().join("old.txt");
        fs::write(&src, b"x").unwrap();

        let actions = FileActions::new(&store, false);
        assert!(matches!(
            actions.rename(&src, "../escape.txt"),
            Err(ActionError::InvalidName(_))
        ));
        actions.rename(&src, "new.txt").unwrap();
        assert!(dir.path().join("new.txt").exists());
        assert_eq!(
            store.last_operation().unwrap().unwrap().kind,
            OperationKind::Rename
        );
    }

    #[test]
    fn test_copy_and_delete() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let copy = dir.path().join("copy.txt");
        fs::write(&src, b"data").unwrap();

        let actions = FileActions::new(&store, false);
        actions.copy_file(&src, &copy).unwrap();
        assert_eq!(fs::read(&copy).unwrap(), b"data");

        actions.delete_file(&copy, None).unwrap();
        assert!(!copy.exists());
        let err = actions.delete_file(&copy, None).unwrap_err();
        assert!(matches!(err, ActionError::SourceMissing(_)));
        assert!(err.is_file_error());
        assert_eq!(store.operation_count().unwrap(), 3);
    }

    #[test]
    fn test_copy_then_remove_relocates_file() {
        let (dir, _store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        fs::write(&src, b"payload").unwrap();

        copy_then_remove(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");

        // Directories are refused and nothing is created
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        assert!(matches!(
            copy_then_remove(&sub, &dir.path().join("sub2")),
            Err(ActionError::Io { .. })
        ));
        assert!(!dir.path().join("sub2").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_move_across_filesystems_and_undo() {
        use std::os::unix::fs::MetadataExt;

        let (dir, store) = setup();
        // Needs a second filesystem; skip where /dev/shm is missing or shared
        let Ok(other) = TempDir::new_in("/dev/shm") else {
            return;
        };
        let dev = |p: &Path| fs::metadata(p).unwrap().dev();
        if dev(dir.path()) == dev(other.path()) {
            return;
        }

        let src = dir.path().join("a.txt");
        let dest = other.path().join("a.txt");
        fs::write(&src, b"across").unwrap();

        let outcome = FileActions::new(&store, false).move_file(&src, &dest).unwrap();
        assert!(outcome.performed);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"across");

        crate::actions::undo_last(&store).unwrap();
        assert_eq!(fs::read(&src).unwrap(), b"across");
        assert!(!dest.exists());
    }

    #[test]
    fn test_store_failure_after_delete_keeps_log_entry() {
        let (dir, store) = setup();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();
        store
            .conn()
            .execute_batch("DROP TABLE duplicate_members;")
            .unwrap();

        let err = FileActions::new(&store, false)
            .delete_file(&path, None)
            .unwrap_err();
        assert!(matches!(err, ActionError::Storage(_)));
        assert!(!path.exists());

        let last = store.last_operation().unwrap().unwrap();
        assert_eq!(last.kind, OperationKind::Delete);
        assert_eq!(last.status, OperationStatus::Success);
    }

    #[test]
    fn test_move_updates_store_record() {
        let (dir, store) = setup();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        fs::write(&src, b"tracked").unwrap();
        let meta = fs::metadata(&src).unwrap();
        let saved = store
            .upsert_file(&crate::model::FileRecord::from_metadata(src.clone(), &meta))
            .unwrap();

        FileActions::new(&store, false).move_file(&src, &dest).unwrap();
        let moved = store.file_by_path(&dest).unwrap().unwrap();
        assert_eq!(moved.id, saved.id);
    }
}
