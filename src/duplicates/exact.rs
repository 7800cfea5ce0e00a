//! Exact duplicate detection with tiered hashing.
//!
//! # Overview
//!
//! [`ExactFinder`] runs the pipeline:
//! 1. **Phase 1 - Size grouping**: see [`crate::duplicates::groups`]
//! 2. **Phase 2 - Fast digest**: hash every size-group member and bucket by
//!    `(size, fast)`
//! 3. **Phase 3 - Strong verification** (optional): hash bucket members with
//!    the strong digest and split buckets that disagree
//!
//! Hashing runs on a rayon pool. Per-file failures are collected in
//! [`ExactStats`] and never abort the run. A shutdown flag is checked
//! between files.
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::duplicates::{ExactConfig, ExactFinder};
//! use dupetrail::enumerate::{EnumerationRequest, FileEnumerator, WalkdirEnumerator};
//! use dupetrail::hasher::StreamingHasher;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let request = EnumerationRequest::new(vec![PathBuf::from(".")]);
//! let files = WalkdirEnumerator::new().collect(&request).files;
//!
//! let finder = ExactFinder::new(Arc::new(StreamingHasher::new()), ExactConfig::default());
//! let outcome = finder.find(files);
//! for found in &outcome.matches {
//!     println!("{} copies of {}", found.group.len(), found.group.fast_hash);
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

use super::groups::{group_by_size, GroupingStats, IndexedFile};
use crate::hasher::{ContentHasher, HashError};
use crate::model::{DuplicateGroup, FileRecord, Hashes};
use crate::progress::ProgressCallback;

/// Default minimum file size considered; skips empty files.
pub const DEFAULT_MIN_SIZE: u64 = 1;

/// Configuration for [`ExactFinder`].
#[derive(Clone)]
pub struct ExactConfig {
    /// Files smaller than this are skipped
    pub min_size: u64,
    /// Confirm fast-digest buckets with the strong digest
    pub verify_with_strong_hash: bool,
    /// Previously computed hashes, reused instead of reading the file
    pub known_hashes: HashMap<PathBuf, Hashes>,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ExactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactConfig")
            .field("min_size", &self.min_size)
            .field("verify_with_strong_hash", &self.verify_with_strong_hash)
            .field("known_hashes", &self.known_hashes.len())
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            verify_with_strong_hash: true,
            known_hashes: HashMap::new(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ExactConfig {
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    #[must_use]
    pub fn with_strong_verification(mut self, verify: bool) -> Self {
        self.verify_with_strong_hash = verify;
        self
    }

    /// Reuse these hashes for matching paths.
    #[must_use]
    pub fn with_known_hashes(mut self, known: HashMap<PathBuf, Hashes>) -> Self {
        self.known_hashes = known;
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from one exact detection run.
#[derive(Debug, Default)]
pub struct ExactStats {
    /// Phase 1 results
    pub grouping: GroupingStats,
    /// Files whose fast digest is known (computed or reused)
    pub processed: usize,
    /// Files that failed to hash
    pub errored: usize,
    /// Per-file hashing errors
    pub errors: Vec<HashError>,
    /// Files whose digests were reused from known hashes
    pub cache_hits: usize,
    /// Strong digests computed or reused
    pub strong_verified: usize,
    /// Files dropped because their strong digest matched no other member
    pub fast_collisions: usize,
    /// Number of groups emitted
    pub duplicate_groups: usize,
    /// Whether the run stopped early on shutdown
    pub interrupted: bool,
}

/// A confirmed group plus the hashes computed for each member.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactMatch {
    pub group: DuplicateGroup,
    /// Parallel to `group.members()`
    pub hashes: Vec<Hashes>,
}

/// Result of [`ExactFinder::find`].
#[derive(Debug, Default)]
pub struct ExactOutcome {
    /// Groups ordered by their first member's input position
    pub matches: Vec<ExactMatch>,
    /// Every file hashed during the run, in input order
    pub computed: Vec<(FileRecord, Hashes)>,
    pub stats: ExactStats,
}

enum Digest {
    /// Digest and whether it came from known hashes
    Done(String, bool),
    /// Backend has no digest of this kind
    Unsupported,
    Failed(HashError),
    Skipped,
}

/// Orchestrates size, fast and strong phases.
pub struct ExactFinder {
    hasher: Arc<dyn ContentHasher>,
    pool: Option<Arc<ThreadPool>>,
    config: ExactConfig,
}

impl ExactFinder {
    #[must_use]
    pub fn new(hasher: Arc<dyn ContentHasher>, config: ExactConfig) -> Self {
        Self {
            hasher,
            pool: None,
            config,
        }
    }

    /// Run hashing on `pool` instead of rayon's global pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ExactConfig {
        &self.config
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Find exact duplicate groups among `files`.
    #[must_use]
    pub fn find(&self, files: Vec<FileRecord>) -> ExactOutcome {
        let (size_groups, grouping) = group_by_size(files, self.config.min_size);
        let mut stats = ExactStats {
            grouping,
            ..ExactStats::default()
        };

        let mut candidates: Vec<IndexedFile> = size_groups.into_values().flatten().collect();
        candidates.sort_unstable_by_key(|c| c.index);
        if candidates.is_empty() {
            log::debug!("Phase 2: No files to process");
            return ExactOutcome {
                stats,
                ..ExactOutcome::default()
            };
        }

        let verify = self.config.verify_with_strong_hash;
        let buckets = self.phase2_fast(candidates, &mut stats);
        // Unverified buckets are never emitted when verification was requested
        let (buckets, emit) = if stats.interrupted {
            (buckets, !verify)
        } else if verify {
            (self.phase3_strong(buckets, &mut stats), true)
        } else {
            (buckets, true)
        };

        let mut computed: Vec<(usize, FileRecord, Hashes)> = Vec::new();
        let mut matches: Vec<(usize, ExactMatch)> = Vec::new();
        for bucket in buckets {
            for (indexed, hashes) in &bucket.members {
                computed.push((indexed.index, indexed.file.clone(), hashes.clone()));
            }
            if !emit || bucket.members.len() < 2 {
                continue;
            }
            let first = bucket.members[0].0.index;
            let hashes: Vec<Hashes> = bucket.members.iter().map(|(_, h)| h.clone()).collect();
            let members = bucket
                .members
                .into_iter()
                .map(|(indexed, hashes)| (indexed.file, hashes))
                .collect();
            match DuplicateGroup::from_hashed(members) {
                Ok(group) => matches.push((first, ExactMatch { group, hashes })),
                Err(e) => log::warn!("Discarding invalid group: {}", e),
            }
        }

        computed.sort_by_key(|(index, _, _)| *index);
        matches.sort_by_key(|(first, _)| *first);
        stats.duplicate_groups = matches.len();

        log::info!(
            "Exact detection complete: {} groups, {} files hashed, {} errors",
            stats.duplicate_groups,
            stats.processed,
            stats.errored
        );

        ExactOutcome {
            matches: matches.into_iter().map(|(_, m)| m).collect(),
            computed: computed.into_iter().map(|(_, file, h)| (file, h)).collect(),
            stats,
        }
    }

    fn phase2_fast(&self, candidates: Vec<IndexedFile>, stats: &mut ExactStats) -> Vec<Bucket> {
        let total = candidates.len();
        log::info!("Phase 2: Computing fast digests for {} files", total);
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("fast-hash", total);
        }

        let results: Vec<(IndexedFile, Digest)> = self.install(|| {
            candidates
                .into_par_iter()
                .enumerate()
                .map(|(idx, candidate)| {
                    let digest = self.fast_one(idx, &candidate);
                    (candidate, digest)
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("fast-hash");
        }

        let mut slots: HashMap<(u64, String), usize> = HashMap::new();
        let mut buckets: Vec<Bucket> = Vec::new();
        for (candidate, digest) in results {
            let fast = match digest {
                Digest::Done(fast, hit) => {
                    stats.processed += 1;
                    if hit {
                        stats.cache_hits += 1;
                    }
                    fast
                }
                Digest::Failed(e) => {
                    stats.errored += 1;
                    stats.errors.push(e);
                    continue;
                }
                Digest::Skipped => {
                    stats.interrupted = true;
                    continue;
                }
                Digest::Unsupported => continue,
            };

            let known_strong = self
                .config
                .known_hashes
                .get(&candidate.file.path)
                .filter(|known| known.fast == fast)
                .and_then(|known| known.strong.clone());
            let hashes = Hashes {
                fast: fast.clone(),
                strong: known_strong,
            };

            let key = (candidate.file.size, fast);
            let slot = *slots.entry(key).or_insert_with(|| {
                buckets.push(Bucket::default());
                buckets.len() - 1
            });
            buckets[slot].members.push((candidate, hashes));
        }

        if stats.interrupted {
            log::info!("Phase 2: Interrupted by shutdown signal");
        }

        let multi = buckets.iter().filter(|b| b.members.len() > 1).count();
        log::info!(
            "Phase 2 complete: {} files hashed, {} buckets with 2+ files",
            stats.processed,
            multi
        );
        buckets
    }

    fn fast_one(&self, idx: usize, candidate: &IndexedFile) -> Digest {
        if self.config.is_shutdown_requested() {
            return Digest::Skipped;
        }
        let path = &candidate.file.path;
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(idx + 1, path.to_string_lossy().as_ref());
        }

        if let Some(known) = self.config.known_hashes.get(path) {
            log::trace!("Fast digest reused: {}", path.display());
            return Digest::Done(known.fast.clone(), true);
        }

        let digest = match self.hasher.fast_digest(path) {
            Ok(fast) => Digest::Done(fast, false),
            Err(e) => {
                log::warn!("Failed to hash {}: {}", path.display(), e);
                Digest::Failed(e)
            }
        };
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_item_completed(candidate.file.size);
        }
        digest
    }

    fn phase3_strong(&self, buckets: Vec<Bucket>, stats: &mut ExactStats) -> Vec<Bucket> {
        let (multi, single): (Vec<Bucket>, Vec<Bucket>) =
            buckets.into_iter().partition(|b| b.members.len() > 1);
        let total: usize = multi.iter().map(|b| b.members.len()).sum();
        log::info!("Phase 3: Verifying {} files with the strong digest", total);
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("strong-hash", total);
        }

        let flat: Vec<(usize, IndexedFile, Hashes)> = multi
            .into_iter()
            .enumerate()
            .flat_map(|(slot, bucket)| {
                bucket
                    .members
                    .into_iter()
                    .map(move |(file, hashes)| (slot, file, hashes))
            })
            .collect();

        let results: Vec<(usize, IndexedFile, Hashes, Digest)> = self.install(|| {
            flat.into_par_iter()
                .enumerate()
                .map(|(idx, (slot, candidate, hashes))| {
                    let digest = self.strong_one(idx, &candidate, &hashes);
                    (slot, candidate, hashes, digest)
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("strong-hash");
        }

        // Split each fast bucket by strong digest; member order is preserved.
        let mut slots: HashMap<(usize, Option<String>), usize> = HashMap::new();
        let mut verified: Vec<Bucket> = Vec::new();
        let mut unverified: Vec<Bucket> = Vec::new();
        for (slot, candidate, mut hashes, digest) in results {
            match digest {
                Digest::Done(strong, _) => {
                    stats.strong_verified += 1;
                    hashes.strong = Some(strong);
                }
                Digest::Unsupported => {
                    log::debug!("{} stays unverified", candidate.file.path.display());
                    unverified.push(Bucket {
                        members: vec![(candidate, hashes)],
                    });
                    continue;
                }
                Digest::Failed(e) => {
                    stats.errored += 1;
                    stats.errors.push(e);
                    continue;
                }
                Digest::Skipped => {
                    stats.interrupted = true;
                    continue;
                }
            }
            let key = (slot, hashes.strong.clone());
            let index = *slots.entry(key).or_insert_with(|| {
                verified.push(Bucket::default());
                verified.len() - 1
            });
            verified[index].members.push((candidate, hashes));
        }

        for bucket in verified.iter().filter(|b| b.members.len() == 1) {
            stats.fast_collisions += 1;
            log::debug!(
                "Fast digest collision without content match: {}",
                bucket.members[0].0.file.path.display()
            );
        }

        if !unverified.is_empty() {
            log::warn!(
                "Hasher '{}' has no strong digest; {} files were not reported as duplicates",
                self.hasher.name(),
                unverified.len()
            );
        }

        log::info!(
            "Phase 3 complete: {} files verified, {} collisions dropped",
            stats.strong_verified,
            stats.fast_collisions
        );

        verified.extend(unverified);
        verified.extend(single);
        verified
    }

    fn strong_one(&self, idx: usize, candidate: &IndexedFile, hashes: &Hashes) -> Digest {
        if self.config.is_shutdown_requested() {
            return Digest::Skipped;
        }
        let path = &candidate.file.path;
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(idx + 1, path.to_string_lossy().as_ref());
        }
        if let Some(ref strong) = hashes.strong {
            log::trace!("Strong digest reused: {}", path.display());
            return Digest::Done(strong.clone(), true);
        }

        let digest = match self.hasher.strong_digest(path) {
            Ok(Some(strong)) => Digest::Done(strong, false),
            Ok(None) => Digest::Unsupported,
            Err(e) => {
                log::warn!("Failed to verify {}: {}", path.display(), e);
                Digest::Failed(e)
            }
        };
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_item_completed(candidate.file.size);
        }
        digest
    }
}

#[derive(Default)]
struct Bucket {
    members: Vec<(IndexedFile, Hashes)>,
}
