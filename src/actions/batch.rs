//! Batch renames and folder organisation.
//!
//! Both batches turn a list of enumerated files into one [`FileActions`]
//! call per file, so every change is logged and the last one can be undone.
//! A dry-run [`FileActions`] makes the whole batch a preview.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use serde::{Deserialize, Serialize};

use super::execute::{ActionError, ActionOutcome, FileActions};
use crate::error::InvalidArgument;
use crate::model::{FileRecord, OperationKind};

/// Default folder layout for [`OrganizeBy::Date`].
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m";

const MIB: u64 = 1024 * 1024;

/// A file name template.
///
/// Placeholders: `{name}` (stem), `{ext}`, `{parent}` (directory name),
/// `{date}` (modification day, `YYYY-MM-DD` local time) and `{counter}`
/// (position in the batch, zero-padded to four digits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePattern(String);

impl RenamePattern {
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] for an empty pattern or one containing a
    /// path separator.
    pub fn new(pattern: impl Into<String>) -> Result<Self, InvalidArgument> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err(InvalidArgument::new("rename pattern cannot be empty"));
        }
        if pattern.contains(['/', '\\']) {
            return Err(InvalidArgument::new(format!(
                "rename pattern '{pattern}' must not contain a path separator"
            )));
        }
        Ok(Self(pattern))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The new file name for `file` at 1-based position `counter`.
    #[must_use]
    pub fn apply(&self, file: &FileRecord, counter: usize) -> String {
        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = file
            .path
            .parent()
            .and_then(Path::file_name)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date = file
            .modified_at
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string();

        self.0
            .replace("{name}", &stem)
            .replace("{ext}", &ext)
            .replace("{parent}", &parent)
            .replace("{date}", &date)
            .replace("{counter}", &format!("{counter:04}"))
    }
}

impl FromStr for RenamePattern {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// How [`organize_files`] picks a file's folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeBy {
    /// Modification date, laid out by a strftime format
    #[default]
    Date,
    /// Lowercase extension, `no-extension` when there is none
    Extension,
    /// `small` (< 1 MiB), `medium` (< 10 MiB), `large` (< 100 MiB) or `huge`
    Size,
}

impl OrganizeBy {
    pub const ALL: [Self; 3] = [Self::Date, Self::Extension, Self::Size];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Extension => "extension",
            Self::Size => "size",
        }
    }
}

impl fmt::Display for OrganizeBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizeBy {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|by| by.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                InvalidArgument::new(format!(
                    "unknown organize rule '{s}' (expected date, extension or size)"
                ))
            })
    }
}

/// Folder rule for [`organize_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeRule {
    by: OrganizeBy,
    date_format: String,
}

impl OrganizeRule {
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `date_format` is not a valid strftime
    /// format or would produce an absolute path.
    pub fn new(by: OrganizeBy, date_format: impl Into<String>) -> Result<Self, InvalidArgument> {
        let date_format = date_format.into();
        if date_format.is_empty()
            || date_format.starts_with('/')
            || StrftimeItems::new(&date_format).any(|item| item == Item::Error)
        {
            return Err(InvalidArgument::new(format!(
                "invalid date format '{date_format}'"
            )));
        }
        Ok(Self { by, date_format })
    }

    #[must_use]
    pub fn by(&self) -> OrganizeBy {
        self.by
    }

    /// Folder for `file`, relative to the destination root.
    #[must_use]
    pub fn folder(&self, file: &FileRecord) -> PathBuf {
        match self.by {
            OrganizeBy::Date => PathBuf::from(
                file.modified_at
                    .with_timezone(&Local)
                    .format(&self.date_format)
                    .to_string(),
            ),
            OrganizeBy::Extension => {
                let ext = file.extension();
                PathBuf::from(if ext.is_empty() { "no-extension" } else { ext.as_str() })
            }
            OrganizeBy::Size => PathBuf::from(match file.size / MIB {
                0 => "small",
                1..=9 => "medium",
                10..=99 => "large",
                _ => "huge",
            }),
        }
    }
}

impl Default for OrganizeRule {
    fn default() -> Self {
        Self {
            by: OrganizeBy::Date,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Whether [`organize_files`] moves or copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transfer {
    #[default]
    Move,
    Copy,
}

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BatchStatus {
    Done,
    Planned,
    /// Target equals the source
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub kind: OperationKind,
    pub source: PathBuf,
    pub dest: PathBuf,
    #[serde(flatten)]
    pub status: BatchStatus,
}

/// Result of a rename or organise batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub done: usize,
    pub planned: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn record(&mut self, kind: OperationKind, source: &Path, dest: PathBuf, status: BatchStatus) {
        match status {
            BatchStatus::Done => self.done += 1,
            BatchStatus::Planned => self.planned += 1,
            BatchStatus::Unchanged => self.unchanged += 1,
            BatchStatus::Failed(_) => self.failed += 1,
        }
        self.entries.push(BatchEntry {
            kind,
            source: source.to_path_buf(),
            dest,
            status,
        });
    }

    fn outcome(
        &mut self,
        kind: OperationKind,
        source: &Path,
        dest: PathBuf,
        result: Result<ActionOutcome, ActionError>,
    ) -> Result<(), ActionError> {
        let status = match result {
            Ok(outcome) if outcome.performed => BatchStatus::Done,
            Ok(_) => BatchStatus::Planned,
            Err(err) if err.is_file_error() => BatchStatus::Failed(err.to_string()),
            Err(err) => return Err(err),
        };
        self.record(kind, source, dest, status);
        Ok(())
    }

    /// Files changed, or that would change in a dry run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.done + self.planned
    }

    /// Human-readable summary of the run.
    #[must_use]
    pub fn summary(&self, verb: &str) -> String {
        if self.planned > 0 {
            format!(
                "Would {verb} {} file(s) (dry run, pass --confirm to apply)",
                self.planned
            )
        } else if self.failed == 0 {
            format!("{}: {} file(s)", capitalize(verb), self.done)
        } else {
            format!(
                "{}: {} file(s), {} failed",
                capitalize(verb),
                self.done,
                self.failed
            )
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Rename every file in `files` according to `pattern`.
///
/// The counter follows the order of `files`. Files whose new name equals
/// the current one are left alone. Per-file failures are recorded in the
/// report and do not stop the batch.
///
/// # Errors
///
/// Returns [`ActionError::Storage`] if the operation log cannot be written.
pub fn rename_files(
    actions: &FileActions<'_>,
    files: &[FileRecord],
    pattern: &RenamePattern,
) -> Result<BatchReport, ActionError> {
    log::info!(
        "{} rename of {} file(s) with '{}'",
        if actions.is_dry_run() { "Simulating" } else { "Executing" },
        files.len(),
        pattern.as_str()
    );
    let mut report = BatchReport::default();
    for (index, file) in files.iter().filter(|f| !f.is_directory).enumerate() {
        let name = pattern.apply(file, index + 1);
        let dest = file
            .path
            .parent()
            .map_or_else(|| PathBuf::from(&name), |parent| parent.join(&name));
        if dest == file.path {
            report.record(OperationKind::Rename, &file.path, dest, BatchStatus::Unchanged);
            continue;
        }
        let result = actions.rename(&file.path, &name);
        report.outcome(OperationKind::Rename, &file.path, dest, result)?;
    }
    log::info!("{}", report.summary("rename"));
    Ok(report)
}

/// Move or copy every file in `files` into a folder under `dest_root`
/// chosen by `rule`, keeping its file name.
///
/// Folders are created as needed, except in a dry run. Existing files are
/// never overwritten; such collisions are recorded as failures.
///
/// # Errors
///
/// Returns [`ActionError::Storage`] if the operation log cannot be written.
pub fn organize_files(
    actions: &FileActions<'_>,
    files: &[FileRecord],
    dest_root: &Path,
    rule: &OrganizeRule,
    transfer: Transfer,
) -> Result<BatchReport, ActionError> {
    let kind = match transfer {
        Transfer::Move => OperationKind::Move,
        Transfer::Copy => OperationKind::Copy,
    };
    log::info!(
        "{} {} of {} file(s) into {} by {}",
        if actions.is_dry_run() { "Simulating" } else { "Executing" },
        kind,
        files.len(),
        dest_root.display(),
        rule.by()
    );

    let mut report = BatchReport::default();
    for file in files.iter().filter(|f| !f.is_directory) {
        let Some(name) = file.path.file_name() else {
            continue;
        };
        let folder = dest_root.join(rule.folder(file));
        let dest = folder.join(name);
        if dest == file.path {
            report.record(kind, &file.path, dest, BatchStatus::Unchanged);
            continue;
        }
        if !actions.is_dry_run() {
            if let Err(e) = fs::create_dir_all(&folder) {
                log::warn!("Cannot create {}: {}", folder.display(), e);
                report.record(kind, &file.path, dest, BatchStatus::Failed(e.to_string()));
                continue;
            }
        }
        let result = match transfer {
            Transfer::Move => actions.move_file(&file.path, &dest),
            Transfer::Copy => actions.copy_file(&file.path, &dest),
        };
        report.outcome(kind, &file.path, dest, result)?;
    }
    log::info!("{}", report.summary(&kind.to_string().to_lowercase()));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationStatus;
    use crate::store::Store;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn mid_march() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).single().unwrap()
    }

    fn write(dir: &Path, name: &str, content: &[u8]) -> FileRecord {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        FileRecord::new(path, content.len() as u64, mid_march())
    }

    #[test]
    fn test_pattern_placeholders() {
        let file = FileRecord::new(PathBuf::from("/photos/trip/IMG_1.JPG"), 3, mid_march());
        let pattern = RenamePattern::new("{parent}_{date}_{counter}_{name}.{ext}").unwrap();
        assert_eq!(pattern.apply(&file, 7), "trip_2024-03-15_0007_IMG_1.JPG");

        assert!(RenamePattern::new("").is_err());
        assert!(RenamePattern::new("sub/{name}").is_err());
        assert!("{name}".parse::<RenamePattern>().is_ok());
    }

    #[test]
    fn test_organize_rule_folders() {
        let small = FileRecord::new(PathBuf::from("/in/a.PNG"), 10, mid_march());
        let big = FileRecord::new(PathBuf::from("/in/b"), 20 * MIB, mid_march());

        let by_date = OrganizeRule::default();
        assert_eq!(by_date.folder(&small), PathBuf::from("2024/03"));

        let by_ext = OrganizeRule::new(OrganizeBy::Extension, DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(by_ext.folder(&small), PathBuf::from("png"));
        assert_eq!(by_ext.folder(&big), PathBuf::from("no-extension"));

        let by_size = OrganizeRule::new(OrganizeBy::Size, DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(by_size.folder(&small), PathBuf::from("small"));
        assert_eq!(by_size.folder(&big), PathBuf::from("large"));

        assert!(OrganizeRule::new(OrganizeBy::Date, "%Q").is_err());
        assert!(OrganizeRule::new(OrganizeBy::Date, "/%Y").is_err());
        assert_eq!("SIZE".parse::<OrganizeBy>().unwrap(), OrganizeBy::Size);
        assert!("colour".parse::<OrganizeBy>().is_err());
    }

    #[test]
    fn test_rename_batch_dry_run_then_confirm() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(dir.path(), "a.txt", b"first"),
            write(dir.path(), "b.txt", b"second"),
        ];
        let store = Store::open_in_memory().unwrap();
        let pattern = RenamePattern::new("doc-{counter}.{ext}").unwrap();

        let preview = rename_files(&FileActions::new(&store, true), &files, &pattern).unwrap();
        assert_eq!(preview.planned, 2);
        assert_eq!(preview.entries[1].dest, dir.path().join("doc-0002.txt"));
        assert!(dir.path().join("a.txt").exists());
        assert!(store.operations(10).unwrap().is_empty());

        let report = rename_files(&FileActions::new(&store, false), &files, &pattern).unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(fs::read(dir.path().join("doc-0001.txt")).unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join("doc-0002.txt")).unwrap(), b"second");
        assert_eq!(store.operations(10).unwrap().len(), 2);
    }

    #[test]
    fn test_rename_batch_collision_is_a_failed_entry() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(dir.path(), "a.txt", b"first"),
            write(dir.path(), "b.txt", b"second"),
            write(dir.path(), "same.txt", b"third"),
        ];
        let store = Store::open_in_memory().unwrap();
        // Every file maps to same.txt
        let pattern = RenamePattern::new("same.txt").unwrap();

        let report = rename_files(&FileActions::new(&store, false), &files, &pattern).unwrap();
        assert_eq!(report.done, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.unchanged, 1);
        assert_eq!(fs::read(dir.path().join("same.txt")).unwrap(), b"third");

        let logged = store.operations(10).unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|op| op.status == OperationStatus::Failed));
    }

    #[test]
    fn test_organize_moves_into_folders() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let files = vec![
            write(src.path(), "one.png", b"image"),
            write(src.path(), "two.txt", b"text"),
        ];
        let store = Store::open_in_memory().unwrap();
        let rule = OrganizeRule::new(OrganizeBy::Extension, DEFAULT_DATE_FORMAT).unwrap();

        let preview = organize_files(
            &FileActions::new(&store, true),
            &files,
            dest.path(),
            &rule,
            Transfer::Move,
        )
        .unwrap();
        assert_eq!(preview.planned, 2);
        assert!(!dest.path().join("png").exists());

        let report = organize_files(
            &FileActions::new(&store, false),
            &files,
            dest.path(),
            &rule,
            Transfer::Move,
        )
        .unwrap();
        assert_eq!(report.done, 2);
        assert!(dest.path().join("png").join("one.png").is_file());
        assert!(dest.path().join("txt").join("two.txt").is_file());
        assert!(!src.path().join("one.png").exists());
    }

    #[test]
    fn test_organize_copy_keeps_sources() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let files = vec![write(src.path(), "one.png", b"image")];
        let store = Store::open_in_memory().unwrap();

        let report = organize_files(
            &FileActions::new(&store, false),
            &files,
            dest.path(),
            &OrganizeRule::default(),
            Transfer::Copy,
        )
        .unwrap();
        assert_eq!(report.done, 1);
        assert_eq!(report.entries[0].kind, OperationKind::Copy);
        assert!(src.path().join("one.png").is_file());
        assert!(dest.path().join("2024").join("03").join("one.png").is_file());

        // A second copy would overwrite
        let again = organize_files(
            &FileActions::new(&store, false),
            &files,
            dest.path(),
            &OrganizeRule::default(),
            Transfer::Copy,
        )
        .unwrap();
        assert_eq!(again.failed, 1);
    }
}
