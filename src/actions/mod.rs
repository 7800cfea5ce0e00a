//! File actions module.
//!
//! This module provides functionality for:
//! - Logged rename, move, copy and delete with a dry-run mode
//! - Delete plans that keep one copy per duplicate group
//! - Pattern renames and folder organisation in batches
//! - Single-level undo of the last logged operation
//!
//! ```no_run
//! use dupetrail::actions::{undo_last, FileActions, UndoOutcome};
//! use dupetrail::store::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("dupetrail.db")).unwrap();
//! FileActions::new(&store, false)
//!     .rename(Path::new("/photos/IMG_0001.png"), "beach.png")
//!     .unwrap();
//! assert!(matches!(undo_last(&store).unwrap(), UndoOutcome::Undone(_)));
//! ```

pub mod batch;
pub mod execute;
pub mod plan;
pub mod undo;

pub use batch::{
    organize_files, rename_files, BatchEntry, BatchReport, BatchStatus, OrganizeBy, OrganizeRule,
    RenamePattern, Transfer, DEFAULT_DATE_FORMAT,
};
pub use execute::{ActionError, ActionOutcome, FileActions};
pub use plan::{
    execute_delete_plan, DeleteEntry, DeletePlan, DeleteReport, DeleteStatus, KeepStrategy,
    PlanEntry,
};
pub use undo::{undo_last, UndoError, UndoOutcome};
