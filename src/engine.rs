//! The engine facade.
//!
//! # Overview
//!
//! [`Engine`] ties the store, the resolved providers and one rayon worker
//! pool together and exposes the public operations:
//!
//! 1. [`Engine::scan`] enumerates roots and persists file records in batches
//! 2. [`Engine::find_exact_duplicates`] runs the size/fast/strong pipeline
//!    over stored files and replaces the stored groups
//! 3. [`Engine::find_near_duplicates`] groups similar images or audio
//! 4. [`Engine::plan_deletions`] and [`Engine::execute_delete_plan`] reduce
//!    groups to one kept copy
//! 5. [`Engine::rename_files`] and [`Engine::organize_files`] rename, move
//!    or copy enumerated files in logged batches
//! 6. [`Engine::undo_last`] reverses the last logged operation
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::engine::{Engine, EngineConfig};
//! use dupetrail::registry::Providers;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let providers = Arc::new(Providers::with_defaults().unwrap());
//! let engine = Engine::open(EngineConfig::default(), providers).unwrap();
//! engine.scan(&[PathBuf::from(".")], &[]).unwrap();
//! let report = engine.find_exact_duplicates().unwrap();
//! println!("{} duplicate groups", report.groups.len());
//! ```

use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::actions::{
    self, BatchReport, DeletePlan, DeleteReport, FileActions, KeepStrategy, OrganizeRule,
    RenamePattern, Transfer, UndoOutcome,
};
use crate::duplicates::{
    find_similar, group_audio_duplicates, group_similar_images, AudioCompareOptions, AudioItem,
    ExactConfig, ExactFinder, ImageGroup, SimilarMatch, DEFAULT_MIN_SIZE,
};
use crate::enumerate::{EnumEvent, EnumerationRequest, FileEnumerator, WalkdirEnumerator};
use crate::error::{EngineError, InvalidArgument};
use crate::hasher::{ContentHasher, MmapHasher, StreamingHasher};
use crate::metadata::{has_extension, ImageCrateMetadata, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS};
use crate::model::{AudioDuplicateGroup, DuplicateGroup, FileRecord, Hashes, Operation};
use crate::progress::ProgressCallback;
use crate::registry::Providers;
use crate::similarity::{PerceptualHasher, PerceptualMethod, DEFAULT_IMAGE_THRESHOLD};
use crate::store::{BatchWriter, Store, DEFAULT_BATCH_SIZE};

/// Engine settings.
///
/// Provider fields name entries in the [`Providers`] registries. An empty
/// fingerprinter or analyzer name means "none".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file
    pub database: PathBuf,
    pub enumerator: String,
    pub hasher: String,
    /// Perceptual hash method for image similarity
    pub perceptual: String,
    pub image_metadata: String,
    pub audio_metadata: String,
    pub content_fingerprinter: String,
    pub precise_fingerprinter: String,
    pub audio_analyzer: String,
    /// Worker threads (0 = available parallelism)
    pub threads: usize,
    /// Records committed per scan transaction
    pub batch_size: usize,
    /// Files smaller than this are never exact duplicates
    pub min_size: u64,
    pub verify_with_strong_hash: bool,
    /// Maximum Hamming distance for image similarity
    pub image_threshold: u32,
    pub image_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub audio: AudioCompareOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: crate::config::default_database_path(),
            enumerator: WalkdirEnumerator::NAME.to_string(),
            hasher: StreamingHasher::NAME.to_string(),
            perceptual: PerceptualMethod::default().as_str().to_string(),
            image_metadata: ImageCrateMetadata::NAME.to_string(),
            audio_metadata: "tags".to_string(),
            content_fingerprinter: "chromaprint".to_string(),
            precise_fingerprinter: String::new(),
            audio_analyzer: String::new(),
            threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            verify_with_strong_hash: true,
            image_threshold: DEFAULT_IMAGE_THRESHOLD,
            image_extensions: IMAGE_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            audio_extensions: AUDIO_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            follow_symlinks: false,
            audio: AudioCompareOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Check values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] for a zero batch size, an image threshold
    /// above 64 bits, or invalid audio options.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if self.batch_size == 0 {
            return Err(InvalidArgument::new("batch_size must be at least 1"));
        }
        if self.image_threshold > 64 {
            return Err(InvalidArgument::new(format!(
                "image_threshold {} exceeds the 64-bit hash length",
                self.image_threshold
            )));
        }
        self.audio.validate()
    }

    /// Use the memory-mapped hasher.
    #[must_use]
    pub fn with_mmap(mut self) -> Self {
        self.hasher = MmapHasher::NAME.to_string();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }
}

/// Totals from [`Engine::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    /// Entries that could not be read, with the cause
    pub errors: Vec<(PathBuf, String)>,
    pub transactions: usize,
    pub interrupted: bool,
}

/// Outcome of [`Engine::find_exact_duplicates`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExactReport {
    /// Stored groups, ordered by their first member's scan position
    pub groups: Vec<DuplicateGroup>,
    pub files: usize,
    /// Files sharing a size with at least one other file
    pub candidates: usize,
    pub hashed: usize,
    pub cache_hits: usize,
    pub strong_verified: usize,
    pub fast_collisions: usize,
    /// Files that could not be hashed, with the cause
    pub failures: Vec<(PathBuf, String)>,
    pub interrupted: bool,
}

impl ExactReport {
    /// Bytes held by every copy beyond the first.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_space).sum()
    }
}

/// Outcome of [`Engine::hash_paths`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashReport {
    /// Digests in enumeration order
    pub hashed: Vec<(PathBuf, Hashes)>,
    /// Files that could not be read, with the cause
    pub failures: Vec<(PathBuf, String)>,
}

/// What [`Engine::find_near_duplicates`] should compare.
#[derive(Debug, Clone, PartialEq)]
pub enum NearKind {
    Image,
    Audio(AudioCompareOptions),
}

/// Outcome of [`Engine::find_near_duplicates`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NearReport {
    Image {
        groups: Vec<ImageGroup>,
        /// Candidate files considered
        examined: usize,
        /// Candidates that could not be decoded
        skipped: usize,
    },
    Audio {
        groups: Vec<AudioDuplicateGroup>,
        examined: usize,
        /// Candidates without readable metadata
        skipped: usize,
    },
}

impl NearReport {
    #[must_use]
    pub fn group_count(&self) -> usize {
        match self {
            Self::Image { groups, .. } => groups.len(),
            Self::Audio { groups, .. } => groups.len(),
        }
    }
}

/// The duplicate detection engine.
pub struct Engine {
    config: EngineConfig,
    providers: Arc<Providers>,
    store: Store,
    pool: Arc<ThreadPool>,
    enumerator: Arc<dyn FileEnumerator>,
    hasher: Arc<dyn ContentHasher>,
    perceptual: Arc<dyn PerceptualHasher>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Engine {
    /// Open the store named by `config.database` and resolve providers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ProviderUnavailable`] for an unknown
    /// enumerator, hasher or perceptual method, [`EngineError::Storage`] if
    /// the store cannot be opened, or [`EngineError::InvalidArgument`] for
    /// invalid settings.
    pub fn open(config: EngineConfig, providers: Arc<Providers>) -> Result<Self, EngineError> {
        config.validate()?;
        let store = Store::open(&config.database)?;
        Self::with_store(config, providers, store)
    }

    /// Like [`Engine::open`] with an already opened store.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::open`], minus the store errors.
    pub fn with_store(
        config: EngineConfig,
        providers: Arc<Providers>,
        store: Store,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let enumerator = providers.enumerators.get(&config.enumerator)?;
        let hasher = providers.hashers.get(&config.hasher)?;
        let perceptual = providers.perceptual.get(&config.perceptual)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("dupetrail-worker-{i}"))
            .build()?;
        log::debug!(
            "Engine ready: enumerator={}, hasher={}, perceptual={}, {} worker threads",
            enumerator.name(),
            hasher.name(),
            perceptual.method(),
            pool.current_num_threads()
        );

        Ok(Self {
            config,
            providers,
            store,
            pool: Arc::new(pool),
            enumerator,
            hasher,
            perceptual,
            shutdown_flag: None,
            progress_callback: None,
        })
    }

    /// Stop long operations between items once `flag` is set.
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

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn providers(&self) -> &Arc<Providers> {
        &self.providers
    }

    /// Logged file actions on this engine's store.
    #[must_use]
    pub fn file_actions(&self, dry_run: bool) -> FileActions<'_> {
        FileActions::new(&self.store, dry_run)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Enumerate `roots` and persist every file and directory found.
    ///
    /// `extensions` overrides the filter for this scan; empty means every
    /// file. Batches committed before an interruption stay in the store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if a batch cannot be committed.
    pub fn scan(&self, roots: &[PathBuf], extensions: &[String]) -> Result<ScanReport, EngineError> {
        let request = EnumerationRequest::new(roots.to_vec())
            .with_extensions(extensions)
            .with_follow_symlinks(self.config.follow_symlinks);
        log::info!("Scanning {} root(s) with {}", roots.len(), self.enumerator.name());
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("scan", 0);
        }

        let mut writer = BatchWriter::new(&self.store, self.config.batch_size);
        let mut report = ScanReport::default();
        let mut failure = None;

        let summary = self.enumerator.enumerate(&request, &mut |event| {
            if self.is_shutdown_requested() {
                return ControlFlow::Break(());
            }
            let pushed = match event {
                EnumEvent::File(record) => {
                    report.files += 1;
                    report.bytes += record.size;
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(report.files, &record.path.to_string_lossy());
                        callback.on_item_completed(record.size);
                    }
                    writer.push(record)
                }
                EnumEvent::Directory(path) => {
                    report.directories += 1;
                    let modified = fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_default();
                    writer.push(FileRecord::directory(path, modified))
                }
                EnumEvent::Error { path, message } => {
                    log::warn!("Cannot read {}: {}", path.display(), message);
                    report.errors.push((path, message));
                    Ok(())
                }
            };
            match pushed {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        });

        if let Some(e) = failure {
            return Err(e.into());
        }
        let batches = writer.finish()?;
        report.transactions = batches.transactions;
        report.interrupted = summary.cancelled;

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("scan");
        }
        log::info!(
            "Scan complete: {} files, {} directories, {} errors{}",
            report.files,
            report.directories,
            report.errors.len(),
            if report.interrupted { " (interrupted)" } else { "" }
        );
        Ok(report)
    }

    /// Find exact duplicates among every stored file.
    ///
    /// Hashes already in the store are reused; new ones are saved. Stored
    /// groups are replaced unless the run was interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the store cannot be read or
    /// updated. Per-file hashing failures are listed in the report.
    pub fn find_exact_duplicates(&self) -> Result<ExactReport, EngineError> {
        let files = self.store.all_files()?;
        let known = self.known_hashes(&files)?;
        log::debug!("Reusing {} stored hash(es)", known.len());

        let mut config = ExactConfig::default()
            .with_min_size(self.config.min_size)
            .with_strong_verification(self.config.verify_with_strong_hash)
            .with_known_hashes(known);
        if let Some(ref flag) = self.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            config = config.with_progress_callback(Arc::clone(callback));
        }

        let finder = ExactFinder::new(Arc::clone(&self.hasher), config).with_pool(Arc::clone(&self.pool));
        let outcome = finder.find(files);
        self.store.save_hashes_batch(&outcome.computed)?;

        let stats = outcome.stats;
        let proposed: Vec<DuplicateGroup> = outcome.matches.into_iter().map(|m| m.group).collect();
        let groups = if stats.interrupted {
            log::warn!("Exact detection interrupted; stored groups left unchanged");
            proposed
        } else {
            self.store.replace_groups(&proposed)?
        };

        Ok(ExactReport {
            groups,
            files: stats.grouping.total_files,
            candidates: stats.grouping.potential_duplicates,
            hashed: stats.processed,
            cache_hits: stats.cache_hits,
            strong_verified: stats.strong_verified,
            fast_collisions: stats.fast_collisions,
            failures: stats
                .errors
                .iter()
                .map(|e| (e.path().to_path_buf(), e.to_string()))
                .collect(),
            interrupted: stats.interrupted,
        })
    }

    fn known_hashes(&self, files: &[FileRecord]) -> Result<HashMap<PathBuf, Hashes>, EngineError> {
        let mut known = HashMap::new();
        for file in files.iter().filter(|f| !f.is_directory && f.has_id()) {
            if let Some(hashes) = self.store.hashes_for(file.id)? {
                known.insert(file.path.clone(), hashes);
            }
        }
        Ok(known)
    }

    /// Group visually similar images or musically identical audio files
    /// among the stored files.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ProviderUnavailable`] for audio when the
    /// configured audio metadata provider is missing or unavailable, and
    /// [`EngineError::InvalidArgument`] for invalid audio options.
    pub fn find_near_duplicates(&self, kind: NearKind) -> Result<NearReport, EngineError> {
        match kind {
            NearKind::Image => self.find_similar_image_groups(),
            NearKind::Audio(options) => self.find_audio_duplicates(options),
        }
    }

    fn stored_files_with(&self, extensions: &[String]) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self
            .store
            .all_files()?
            .into_iter()
            .filter(|f| !f.is_directory && has_extension(&f.path, extensions))
            .map(|f| f.path)
            .collect())
    }

    fn find_similar_image_groups(&self) -> Result<NearReport, EngineError> {
        let candidates = self.stored_files_with(&self.config.image_extensions)?;
        let image_metadata = self.providers.image_metadata.try_get(&self.config.image_metadata);
        log::info!(
            "Hashing {} image(s) with {}",
            candidates.len(),
            self.perceptual.method()
        );

        let perceptual = &self.perceptual;
        let hashed: Vec<(PathBuf, _)> = self.pool.install(|| {
            candidates
                .par_iter()
                .filter(|path| {
                    image_metadata
                        .as_ref()
                        .map_or(true, |m| m.is_available() && m.can_handle(path))
                })
                .filter_map(|path| perceptual.hash_path(path).map(|h| (path.clone(), h)))
                .collect()
        });
        let skipped = candidates.len() - hashed.len();
        if skipped > 0 {
            log::debug!("{} image(s) could not be decoded", skipped);
        }

        let groups = group_similar_images(&hashed, self.config.image_threshold)?;
        log::info!("Found {} similar image group(s)", groups.len());
        Ok(NearReport::Image {
            groups,
            examined: candidates.len(),
            skipped,
        })
    }

    fn find_audio_duplicates(&self, options: AudioCompareOptions) -> Result<NearReport, EngineError> {
        options.validate()?;
        let metadata_provider = self
            .providers
            .audio_metadata
            .get(&self.config.audio_metadata)?;
        if !metadata_provider.is_available() {
            return Err(EngineError::ProviderUnavailable {
                capability: self.providers.audio_metadata.capability().to_string(),
                name: self.config.audio_metadata.clone(),
                available: self.providers.audio_metadata.names(),
            });
        }

        let fingerprinters = &self.providers.fingerprinters;
        let content = fingerprinters.try_get(&self.config.content_fingerprinter);
        let precise = fingerprinters.try_get(&self.config.precise_fingerprinter);
        let analyzer = self
            .providers
            .audio_analyzers
            .try_get(&self.config.audio_analyzer)
            .filter(|a| a.is_available());

        let candidates = self.stored_files_with(&self.config.audio_extensions)?;
        log::info!("Reading tags for {} audio file(s)", candidates.len());

        let groups = self.pool.install(|| {
            let items: Vec<AudioItem> = candidates
                .par_iter()
                .filter(|path| metadata_provider.can_handle(path))
                .filter_map(|path| {
                    let metadata = metadata_provider.read(path)?;
                    let analysis = analyzer
                        .as_ref()
                        .filter(|a| a.can_handle(path))
                        .and_then(|a| a.analyze(path));
                    Some(AudioItem {
                        path: path.clone(),
                        metadata,
                        analysis,
                    })
                })
                .collect();
            let examined = items.len();
            group_audio_duplicates(items, options, content, precise).map(|g| (g, examined))
        });
        let (groups, with_metadata) = groups?;

        log::info!("Found {} audio duplicate group(s)", groups.len());
        Ok(NearReport::Audio {
            groups,
            examined: candidates.len(),
            skipped: candidates.len() - with_metadata,
        })
    }

    /// Stored images within `threshold` of `reference`, closest first.
    ///
    /// `None` uses the configured threshold.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if the reference image
    /// cannot be decoded.
    pub fn find_similar_images(
        &self,
        reference: &Path,
        threshold: Option<u32>,
    ) -> Result<Vec<SimilarMatch>, EngineError> {
        let reference_hash = self.perceptual.hash_path(reference).ok_or_else(|| {
            InvalidArgument::new(format!("cannot decode reference image {}", reference.display()))
        })?;
        let candidates: Vec<PathBuf> = self
            .stored_files_with(&self.config.image_extensions)?
            .into_iter()
            .filter(|p| p.as_path() != reference)
            .collect();
        let threshold = threshold.unwrap_or(self.config.image_threshold);

        let perceptual = self.perceptual.as_ref();
        let matches = self
            .pool
            .install(|| find_similar(perceptual, &reference_hash, &candidates, threshold))?;
        log::info!(
            "{} of {} image(s) within distance {} of {}",
            matches.len(),
            candidates.len(),
            threshold,
            reference.display()
        );
        Ok(matches)
    }

    /// Plan deletions over the stored exact-duplicate groups.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the groups cannot be read.
    pub fn plan_deletions(&self, strategy: KeepStrategy) -> Result<DeletePlan, EngineError> {
        let groups = self.store.all_groups()?;
        Ok(DeletePlan::from_groups(&groups, strategy))
    }

    /// Execute (`confirm`) or simulate a delete plan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the operation log cannot be
    /// written. Per-file failures are listed in the report.
    pub fn execute_delete_plan(
        &self,
        plan: &DeletePlan,
        confirm: bool,
    ) -> Result<DeleteReport, EngineError> {
        Ok(actions::execute_delete_plan(&self.store, plan, confirm)?)
    }

    /// Reverse the most recent logged operation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Undo`] when the operation cannot be reversed.
    pub fn undo_last(&self) -> Result<UndoOutcome, EngineError> {
        Ok(actions::undo_last(&self.store)?)
    }

    fn enumerate_files(
        &self,
        roots: &[PathBuf],
        extensions: &[String],
    ) -> (Vec<FileRecord>, Vec<(PathBuf, String)>) {
        let request = EnumerationRequest::new(roots.to_vec())
            .with_extensions(extensions)
            .with_follow_symlinks(self.config.follow_symlinks);
        let result = self.enumerator.collect(&request);
        for (path, message) in &result.errors {
            log::warn!("Cannot read {}: {}", path.display(), message);
        }
        (result.files, result.errors)
    }

    /// Compute digests for every file under `roots` without recording them.
    ///
    /// With `fast_only` the strong digest is skipped.
    #[must_use]
    pub fn hash_paths(
        &self,
        roots: &[PathBuf],
        extensions: &[String],
        fast_only: bool,
    ) -> HashReport {
        let (files, mut failures) = self.enumerate_files(roots, extensions);
        log::info!("Hashing {} file(s) with {}", files.len(), self.hasher.name());

        let hasher = &self.hasher;
        let results: Vec<(PathBuf, Result<Hashes, String>)> = self.pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let hashes = if fast_only {
                        hasher
                            .fast_digest(&file.path)
                            .map(|fast| Hashes { fast, strong: None })
                    } else {
                        hasher.full(&file.path)
                    };
                    (file.path, hashes.map_err(|e| e.to_string()))
                })
                .collect()
        });

        let mut report = HashReport::default();
        for (path, result) in results {
            match result {
                Ok(hashes) => report.hashed.push((path, hashes)),
                Err(message) => {
                    log::warn!("Failed to hash {}: {}", path.display(), message);
                    failures.push((path, message));
                }
            }
        }
        report.failures = failures;
        report
    }

    /// Rename every file under `roots` with `pattern`.
    ///
    /// Without `confirm` nothing is touched or logged and the report lists
    /// the planned renames.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the operation log cannot be
    /// written. Per-file failures are listed in the report.
    pub fn rename_files(
        &self,
        roots: &[PathBuf],
        extensions: &[String],
        pattern: &RenamePattern,
        confirm: bool,
    ) -> Result<BatchReport, EngineError> {
        let (files, _) = self.enumerate_files(roots, extensions);
        Ok(actions::rename_files(&self.file_actions(!confirm), &files, pattern)?)
    }

    /// Move or copy every file under `roots` into folders below `dest`.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::rename_files`].
    pub fn organize_files(
        &self,
        roots: &[PathBuf],
        extensions: &[String],
        dest: &Path,
        rule: &OrganizeRule,
        transfer: Transfer,
        confirm: bool,
    ) -> Result<BatchReport, EngineError> {
        let (files, _) = self.enumerate_files(roots, extensions);
        Ok(actions::organize_files(
            &self.file_actions(!confirm),
            &files,
            dest,
            rule,
            transfer,
        )?)
    }

    /// Up to `limit` logged operations, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the log cannot be read.
    pub fn history(&self, limit: usize) -> Result<Vec<Operation>, EngineError> {
        Ok(self.store.operations(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(config: EngineConfig) -> Engine {
        let providers = Arc::new(Providers::with_defaults().unwrap());
        Engine::with_store(config, providers, Store::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_hasher_is_provider_unavailable() {
        let providers = Arc::new(Providers::with_defaults().unwrap());
        let config = EngineConfig {
            hasher: "sha1".to_string(),
            ..EngineConfig::default()
        };
        let err = Engine::with_store(config, providers, Store::open_in_memory().unwrap())
            .err()
            .unwrap();
        match err {
            EngineError::ProviderUnavailable { name, available, .. } => {
                assert_eq!(name, "sha1");
                assert!(available.contains(&"streaming".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let providers = Arc::new(Providers::with_defaults().unwrap());
        let config = EngineConfig {
            batch_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::with_store(config, providers, Store::open_in_memory().unwrap()),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scan_then_exact_duplicates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"same content").unwrap();
        fs::write(dir.path().join("b.txt"), b"same content").unwrap();
        fs::write(dir.path().join("c.txt"), b"other stuff!").unwrap();

        let engine = engine(EngineConfig::default());
        let scan = engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
        assert_eq!(scan.files, 3);
        assert!(scan.directories >= 1);

        let report = engine.find_exact_duplicates().unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].len(), 2);
        assert!(report.groups[0].id.is_some());
        assert_eq!(engine.store().group_count().unwrap(), 1);

        // Second run reuses stored hashes
        let again = engine.find_exact_duplicates().unwrap();
        assert!(again.cache_hits > 0);
        assert_eq!(again.groups.len(), 1);
    }

    #[test]
    fn test_hash_paths_fast_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        fs::write(dir.path().join("b.txt"), b"beta").unwrap();

        let engine = engine(EngineConfig::default());
        let full = engine.hash_paths(&[dir.path().to_path_buf()], &[], false);
        assert_eq!(full.hashed.len(), 2);
        assert_eq!(full.hashed[0].0, dir.path().join("a.txt"));
        assert!(full.hashed.iter().all(|(_, h)| h.has_strong()));

        let fast = engine.hash_paths(&[dir.path().join("b.txt")], &[], true);
        assert_eq!(fast.hashed.len(), 1);
        assert!(!fast.hashed[0].1.has_strong());
        assert_eq!(fast.hashed[0].1.fast, full.hashed[1].1.fast);
        // Nothing is recorded
        assert_eq!(engine.store().file_count().unwrap(), 0);
    }

    #[test]
    fn test_organize_then_undo_last_move() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(src.path().join("a.png"), b"image").unwrap();
        fs::write(src.path().join("b.txt"), b"text").unwrap();

        let engine = engine(EngineConfig::default());
        let rule = OrganizeRule::new(actions::OrganizeBy::Extension, actions::DEFAULT_DATE_FORMAT)
            .unwrap();
        let roots = [src.path().to_path_buf()];

        let preview = engine
            .organize_files(&roots, &[], dest.path(), &rule, Transfer::Move, false)
            .unwrap();
        assert_eq!(preview.planned, 2);
        assert!(engine.history(10).unwrap().is_empty());

        let report = engine
            .organize_files(&roots, &[], dest.path(), &rule, Transfer::Move, true)
            .unwrap();
        assert_eq!(report.done, 2);
        assert!(dest.path().join("txt").join("b.txt").is_file());

        assert!(matches!(engine.undo_last().unwrap(), UndoOutcome::Undone(_)));
        assert!(src.path().join("b.txt").is_file());
        assert!(dest.path().join("png").join("a.png").is_file());
    }

    #[test]
    fn test_rename_files_with_extension_filter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();
        fs::write(dir.path().join("b.png"), b"y").unwrap();

        let engine = engine(EngineConfig::default());
        let pattern = RenamePattern::new("renamed-{counter}.{ext}").unwrap();
        let report = engine
            .rename_files(&[dir.path().to_path_buf()], &["png".to_string()], &pattern, true)
            .unwrap();
        assert_eq!(report.done, 1);
        assert!(dir.path().join("renamed-0001.png").is_file());
        assert!(dir.path().join("a.txt").is_file());
    }

    #[test]
    fn test_scan_with_extension_filter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();
        fs::write(dir.path().join("b.png"), b"y").unwrap();

        let engine = engine(EngineConfig::default());
        let scan = engine
            .scan(&[dir.path().to_path_buf()], &["PNG".to_string()])
            .unwrap();
        assert_eq!(scan.files, 1);
    }

    #[test]
    fn test_scan_interrupted_before_start() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let engine = engine(EngineConfig::default()).with_shutdown_flag(flag);
        let scan = engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
        assert!(scan.interrupted);
        assert_eq!(scan.files, 0);
    }

    #[test]
    fn test_audio_without_metadata_provider() {
        let engine = engine(EngineConfig::default());
        let err = engine
            .find_near_duplicates(NearKind::Audio(AudioCompareOptions::default()))
            .unwrap_err();
        match err {
            EngineError::ProviderUnavailable { name, .. } => assert_eq!(name, "tags"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plan_and_execute_deletions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bin"), b"duplicate bytes").unwrap();
        fs::write(dir.path().join("b.bin"), b"duplicate bytes").unwrap();

        let engine = engine(EngineConfig::default());
        engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
        engine.find_exact_duplicates().unwrap();

        let plan = engine.plan_deletions(KeepStrategy::First).unwrap();
        assert_eq!(plan.len(), 1);
        let report = engine.execute_delete_plan(&plan, true).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(engine.store().group_count().unwrap(), 0);
        assert_eq!(engine.history(10).unwrap().len(), 1);
    }

    #[test]
    fn test_similar_images_unknown_reference() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("not-an-image.png");
        fs::write(&bogus, b"plain text").unwrap();

        let engine = engine(EngineConfig::default());
        assert!(matches!(
            engine.find_similar_images(&bogus, None),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
