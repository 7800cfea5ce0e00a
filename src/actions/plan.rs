//! Delete plans for exact-duplicate groups.
//!
//! A [`DeletePlan`] keeps one member of every group, chosen by a
//! [`KeepStrategy`], and lists the rest for deletion. Executing a plan goes
//! through [`FileActions`] so every deletion is logged.
//!
//! At least one copy is always preserved: when the kept file has vanished
//! since the scan, nothing in its group is deleted.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::execute::{ActionError, FileActions};
use crate::error::InvalidArgument;
use crate::model::{DuplicateGroup, FileRecord};
use crate::store::Store;

/// Which member of a group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepStrategy {
    /// Earliest modification time
    Oldest,
    /// Latest modification time
    Newest,
    /// Shortest path
    Shortest,
    /// Longest path
    Longest,
    /// First member in scan order
    #[default]
    First,
}

impl KeepStrategy {
    pub const ALL: [Self; 5] = [
        Self::Oldest,
        Self::Newest,
        Self::Shortest,
        Self::Longest,
        Self::First,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oldest => "oldest",
            Self::Newest => "newest",
            Self::Shortest => "shortest",
            Self::Longest => "longest",
            Self::First => "first",
        }
    }

    /// Ordering that puts the member to keep first.
    fn compare(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let path_len = |f: &FileRecord| f.path.as_os_str().len();
        match self {
            Self::Oldest => a.modified_at.cmp(&b.modified_at),
            Self::Newest => b.modified_at.cmp(&a.modified_at),
            Self::Shortest => path_len(a).cmp(&path_len(b)),
            Self::Longest => path_len(b).cmp(&path_len(a)),
            Self::First => Ordering::Equal,
        }
    }

    /// Index of the member to keep. Ties go to the earlier member.
    #[must_use]
    pub fn select(self, members: &[FileRecord]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, member) in members.iter().enumerate() {
            match best {
                Some(b) if self.compare(member, &members[b]) != Ordering::Less => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

impl fmt::Display for KeepStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeepStrategy {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                InvalidArgument::new(format!(
                    "unknown keep strategy '{s}' (expected oldest, newest, shortest, longest or first)"
                ))
            })
    }
}

/// One planned deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub keep: PathBuf,
    pub delete: PathBuf,
    pub size: u64,
}

/// Deletions that reduce every group to a single kept copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletePlan {
    pub strategy: KeepStrategy,
    pub entries: Vec<PlanEntry>,
}

impl DeletePlan {
    /// Build a plan over `groups`, keeping one member per group.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup], strategy: KeepStrategy) -> Self {
        let mut entries = Vec::new();
        for group in groups {
            let members = group.members();
            let Some(keep) = strategy.select(members) else {
                continue;
            };
            entries.extend(
                members
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != keep)
                    .map(|(_, f)| PlanEntry {
                        keep: members[keep].path.clone(),
                        delete: f.path.clone(),
                        size: group.size,
                    }),
            );
        }
        Self { strategy, entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes freed if every entry is deleted.
    #[must_use]
    pub fn reclaimable(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// What happened to one planned deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    WouldDelete,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteEntry {
    pub keep: PathBuf,
    pub path: PathBuf,
    pub size: u64,
    pub status: DeleteStatus,
}

/// Result of executing or simulating a [`DeletePlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
    pub would_delete: usize,
    pub bytes_freed: u64,
    pub entries: Vec<DeleteEntry>,
}

impl DeleteReport {
    fn record(&mut self, entry: &PlanEntry, status: DeleteStatus) {
        match &status {
            DeleteStatus::Deleted => {
                self.deleted += 1;
                self.bytes_freed += entry.size;
            }
            DeleteStatus::WouldDelete => self.would_delete += 1,
            DeleteStatus::Failed(_) => self.failed += 1,
        }
        self.entries.push(DeleteEntry {
            keep: entry.keep.clone(),
            path: entry.delete.clone(),
            size: entry.size,
            status,
        });
    }

    /// Human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.would_delete > 0 {
            format!(
                "Would delete {} file(s) (dry run, pass --confirm to delete)",
                self.would_delete
            )
        } else if self.failed == 0 {
            format!(
                "Deleted {} file(s), freed {}",
                self.deleted,
                bytesize::ByteSize(self.bytes_freed)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.deleted,
                self.failed,
                bytesize::ByteSize(self.bytes_freed)
            )
        }
    }
}

/// Execute `plan` when `confirm` is set; otherwise report what would happen.
///
/// Per-file failures are recorded in the report and do not stop the run.
///
/// # Errors
///
/// Returns [`ActionError::Storage`] if the operation log cannot be written.
pub fn execute_delete_plan(
    store: &Store,
    plan: &DeletePlan,
    confirm: bool,
) -> Result<DeleteReport, ActionError> {
    let mut report = DeleteReport::default();
    let actions = FileActions::new(store, !confirm);
    log::info!(
        "{} {} planned deletion(s), keeping {}",
        if confirm { "Executing" } else { "Simulating" },
        plan.len(),
        plan.strategy
    );

    for entry in &plan.entries {
        if !confirm {
            report.record(entry, DeleteStatus::WouldDelete);
            continue;
        }
        if !entry.keep.is_file() {
            log::warn!(
                "Kept file {} is missing, not deleting {}",
                entry.keep.display(),
                entry.delete.display()
            );
            report.record(
                entry,
                DeleteStatus::Failed(format!("kept file missing: {}", entry.keep.display())),
            );
            continue;
        }

        let details = format!("duplicate of {}", entry.keep.display());
        match actions.delete_file(&entry.delete, Some(&details)) {
            Ok(_) => report.record(entry, DeleteStatus::Deleted),
            Err(err) if err.is_file_error() => {
                report.record(entry, DeleteStatus::Failed(err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }

    log::info!("{}", report.summary());
    Ok(report)
}
