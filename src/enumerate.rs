//! File enumeration interface and the walkdir-backed default.
//!
//! # Overview
//!
//! An enumerator walks root paths and pushes [`EnumEvent`]s to a callback as
//! it goes, so consumers can start processing before the walk finishes. The
//! callback returns [`ControlFlow::Break`] to stop the walk early.
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::enumerate::{EnumerationRequest, FileEnumerator, WalkdirEnumerator};
//! use std::path::PathBuf;
//!
//! let request = EnumerationRequest::new(vec![PathBuf::from(".")]);
//! let result = WalkdirEnumerator::new().collect(&request);
//! println!("{} files", result.files.len());
//! ```

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::model::file::extension_of;
use crate::model::FileRecord;

/// What to enumerate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationRequest {
    /// Root paths; missing roots are skipped with a warning
    pub roots: Vec<PathBuf>,
    /// Lowercase extensions without the dot; empty means every file
    pub extensions: HashSet<String>,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
}

impl EnumerationRequest {
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Restrict to the given extensions (normalized to lowercase, no dot).
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Whether a file path passes the extension filter.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        self.extensions.is_empty() || self.extensions.contains(&extension_of(path))
    }
}

/// One step of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumEvent {
    /// A regular file passing the filter
    File(FileRecord),
    /// A directory was entered
    Directory(PathBuf),
    /// An entry could not be read; the walk continues
    Error {
        /// Path that failed
        path: PathBuf,
        /// Human-readable cause
        message: String,
    },
}

/// Counts reported when an enumeration ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationSummary {
    pub files: usize,
    pub directories: usize,
    pub errors: usize,
    /// The callback stopped the walk
    pub cancelled: bool,
}

/// A fully materialized enumeration.
#[derive(Debug, Clone, Default)]
pub struct EnumerationResult {
    pub files: Vec<FileRecord>,
    pub directories: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Walks directory trees and reports what it finds.
pub trait FileEnumerator: Send + Sync {
    /// Registry name of this enumerator.
    fn name(&self) -> &str;

    /// Push every event for `request` to `on_event` until the walk ends or
    /// the callback breaks.
    fn enumerate(
        &self,
        request: &EnumerationRequest,
        on_event: &mut dyn FnMut(EnumEvent) -> ControlFlow<()>,
    ) -> EnumerationSummary;

    /// Run the walk to completion and collect every event.
    fn collect(&self, request: &EnumerationRequest) -> EnumerationResult {
        let mut result = EnumerationResult::default();
        self.enumerate(request, &mut |event| {
            match event {
                EnumEvent::File(file) => result.files.push(file),
                EnumEvent::Directory(dir) => result.directories.push(dir),
                EnumEvent::Error { path, message } => result.errors.push((path, message)),
            }
            ControlFlow::Continue(())
        });
        result
    }
}

/// Enumerator backed by the `walkdir` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirEnumerator;

impl WalkdirEnumerator {
    /// Registry name of this enumerator.
    pub const NAME: &'static str = "walkdir";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileEnumerator for WalkdirEnumerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enumerate(
        &self,
        request: &EnumerationRequest,
        on_event: &mut dyn FnMut(EnumEvent) -> ControlFlow<()>,
    ) -> EnumerationSummary {
        let mut summary = EnumerationSummary::default();

        for root in &request.roots {
            if !root.exists() {
                log::warn!("Skipping missing root: {}", root.display());
                continue;
            }
            log::debug!("Enumerating {}", root.display());

            let walker = WalkDir::new(root)
                .follow_links(request.follow_symlinks)
                .sort_by_file_name();
            for entry in walker {
                let event = match entry {
                    Ok(entry) => {
                        let file_type = entry.file_type();
                        if file_type.is_dir() {
                            summary.directories += 1;
                            EnumEvent::Directory(entry.into_path())
                        } else if file_type.is_file() {
                            if !request.accepts(entry.path()) {
                                continue;
                            }
                            match entry.metadata() {
                                Ok(metadata) => {
                                    summary.files += 1;
                                    EnumEvent::File(FileRecord::from_metadata(
                                        entry.into_path(),
                                        &metadata,
                                    ))
                                }
                                Err(e) => {
                                    summary.errors += 1;
                                    log::warn!("Cannot read metadata for {}: {}", entry.path().display(), e);
                                    EnumEvent::Error {
                                        path: entry.into_path(),
                                        message: e.to_string(),
                                    }
                                }
                            }
                        } else {
                            // Unfollowed symlinks, sockets, devices
                            log::trace!("Skipping non-regular entry: {}", entry.path().display());
                            continue;
                        }
                    }
                    Err(e) => {
                        summary.errors += 1;
                        let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                        log::warn!("Error walking {}: {}", path.display(), e);
                        EnumEvent::Error {
                            path,
                            message: e.to_string(),
                        }
                    }
                };

                if on_event(event).is_break() {
                    log::debug!("Enumeration cancelled by consumer");
                    summary.cancelled = true;
                    return summary;
                }
            }
        }

        summary
    }
}
