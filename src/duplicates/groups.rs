//! Size-based partitioning (Phase 1 of exact duplicate detection).
//!
//! # Overview
//!
//! Files with different sizes cannot be duplicates, so grouping by exact
//! size removes most candidates before any file is read. Directories and
//! files below the minimum size are skipped; sizes seen only once are
//! dropped.
//!
//! Every file keeps its position in the input as [`IndexedFile::index`] so
//! later phases can restore scan order.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use dupetrail::duplicates::group_by_size;
//! use dupetrail::model::FileRecord;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, Utc::now()),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, Utc::now()),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, Utc::now()),
//! ];
//!
//! let (groups, stats) = group_by_size(files, 1);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::collections::HashMap;

use crate::model::FileRecord;

/// A file tagged with its position in the input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub index: usize,
    pub file: FileRecord,
}

/// Statistics from the size grouping phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of records seen, directories included
    pub total_files: usize,
    /// Total size of all regular files in bytes
    pub total_size: u64,
    /// Directory records skipped
    pub directories: usize,
    /// Files skipped for being smaller than the minimum size
    pub below_min_size: usize,
    /// Number of unique file sizes among the remaining files
    pub unique_sizes: usize,
    /// Number of files that could be duplicates (in groups of 2+)
    pub potential_duplicates: usize,
    /// Number of files eliminated as unique (singleton groups)
    pub eliminated_unique: usize,
    /// Number of size groups with 2+ files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of regular files eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        let files = self.total_files - self.directories;
        if files == 0 {
            0.0
        } else {
            ((files - self.potential_duplicates) as f64 / files as f64) * 100.0
        }
    }

    /// Upper bound on reclaimable space if every size group were duplicates.
    #[must_use]
    pub fn max_potential_savings(groups: &HashMap<u64, Vec<IndexedFile>>) -> u64 {
        groups
            .iter()
            .map(|(size, files)| size * (files.len() as u64).saturating_sub(1))
            .sum()
    }
}

/// Group files by size.
///
/// Returns only sizes shared by two or more files; each group keeps input
/// order. No file I/O is performed.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
    min_size: u64,
) -> (HashMap<u64, Vec<IndexedFile>>, GroupingStats) {
    let mut all_groups: HashMap<u64, Vec<IndexedFile>> = HashMap::new();
    let mut stats = GroupingStats::default();

    for (index, file) in files.into_iter().enumerate() {
        stats.total_files += 1;
        if file.is_directory {
            stats.directories += 1;
            continue;
        }
        stats.total_size += file.size;

        if file.size < min_size {
            stats.below_min_size += 1;
            log::trace!("Below minimum size: {}", file.path.display());
            continue;
        }

        all_groups
            .entry(file.size)
            .or_default()
            .push(IndexedFile { index, file });
    }

    if stats.below_min_size > 0 {
        log::debug!(
            "Skipped {} file(s) smaller than {} bytes",
            stats.below_min_size,
            min_size
        );
    }

    stats.unique_sizes = all_groups.len();

    let filtered_groups: HashMap<u64, Vec<IndexedFile>> = all_groups
        .into_iter()
        .filter(|(size, files)| {
            if files.len() == 1 {
                stats.eliminated_unique += 1;
                log::trace!(
                    "Eliminated unique size {}: {}",
                    size,
                    files[0].file.path.display()
                );
                false
            } else {
                stats.potential_duplicates += files.len();
                stats.duplicate_groups += 1;
                log::debug!(
                    "Size group {} bytes: {} potential duplicates",
                    size,
                    files.len()
                );
                true
            }
        })
        .collect();

    log::info!(
        "Phase 1 complete: {} files → {} potential duplicates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (filtered_groups, stats)
}
