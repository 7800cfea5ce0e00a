//! Near-duplicate matching for images and audio.
//!
//! Images are compared by perceptual-hash Hamming distance. Audio files are
//! compared pairwise by up to three independent comparators (tags, content
//! fingerprint, precise fingerprint); a pair matches when any enabled
//! comparator reaches its own threshold. Both produce groups as connected
//! components of the pairwise match graph.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::components::connected_components;
use crate::error::InvalidArgument;
use crate::model::{
    AudioDuplicateFile, AudioDuplicateGroup, AudioFingerprint, AudioMetadata,
    AudioQualityAnalysis, PerceptualHash,
};
use crate::similarity::{AudioFingerprinter, PerceptualHasher, SimilarityIndex};

/// A candidate within the distance threshold of a reference image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarMatch {
    /// Position of the candidate in the input
    pub index: usize,
    pub path: PathBuf,
    pub hash: PerceptualHash,
    pub distance: u32,
}

/// Candidates within `threshold` of `reference`, nearest first.
///
/// Each candidate is hashed with `hasher`; undecodable candidates are
/// skipped. Equal distances keep input order.
///
/// # Errors
///
/// Returns [`InvalidArgument`] if `hasher` uses a different method than
/// `reference`.
pub fn find_similar(
    hasher: &dyn PerceptualHasher,
    reference: &PerceptualHash,
    candidates: &[PathBuf],
    threshold: u32,
) -> Result<Vec<SimilarMatch>, InvalidArgument> {
    if hasher.method() != reference.method {
        return Err(InvalidArgument::new(format!(
            "reference hash uses {} but the hasher produces {}",
            reference.method,
            hasher.method()
        )));
    }

    let hashed: Vec<Option<PerceptualHash>> = candidates
        .par_iter()
        .map(|path| hasher.hash_path(path))
        .collect();

    let mut matches = Vec::new();
    for (index, (path, hash)) in candidates.iter().zip(hashed).enumerate() {
        let Some(hash) = hash else { continue };
        let distance = reference.distance(&hash)?;
        if distance <= threshold {
            matches.push(SimilarMatch {
                index,
                path: path.clone(),
                hash,
                distance,
            });
        }
    }
    // sort_by_key is stable
    matches.sort_by_key(|m| m.distance);
    Ok(matches)
}

/// Images judged visually similar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageGroup {
    /// Members in input order
    pub members: Vec<(PathBuf, PerceptualHash)>,
    /// Largest distance on any matching edge inside the group
    pub max_distance: u32,
}

impl ImageGroup {
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|(p, _)| p.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Group images whose hashes are within `threshold` of each other,
/// transitively.
///
/// # Errors
///
/// Returns [`InvalidArgument`] if the hashes do not all share one method.
pub fn group_similar_images(
    items: &[(PathBuf, PerceptualHash)],
    threshold: u32,
) -> Result<Vec<ImageGroup>, InvalidArgument> {
    let Some((_, first)) = items.first() else {
        return Ok(Vec::new());
    };

    let mut index = SimilarityIndex::new(first.method.clone());
    for (i, (_, hash)) in items.iter().enumerate() {
        index.insert(i, hash)?;
    }

    let mut edges: Vec<(usize, usize, u32)> = Vec::new();
    for (i, (_, hash)) in items.iter().enumerate() {
        for (distance, j) in index.find(hash, threshold)? {
            if j > i {
                edges.push((i, j, distance));
            }
        }
    }
    log::debug!(
        "Image similarity graph: {} images, {} edges within distance {}",
        items.len(),
        edges.len(),
        threshold
    );

    let components = connected_components(items.len(), edges.iter().map(|&(a, b, _)| (a, b)));
    let mut component_of = vec![usize::MAX; items.len()];
    for (c, members) in components.iter().enumerate() {
        for &m in members {
            component_of[m] = c;
        }
    }
    let mut max_distance = vec![0u32; components.len()];
    for &(a, _, distance) in &edges {
        let c = component_of[a];
        max_distance[c] = max_distance[c].max(distance);
    }

    Ok(components
        .into_iter()
        .zip(max_distance)
        .map(|(members, max_distance)| ImageGroup {
            members: members.into_iter().map(|m| items[m].clone()).collect(),
            max_distance,
        })
        .collect())
}

/// Default maximum duration difference for two tracks to be compared.
pub const DEFAULT_DURATION_TOLERANCE_MS: u64 = 3000;

/// Which audio comparators run and how strict each one is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioCompareOptions {
    pub use_tags: bool,
    pub use_content: bool,
    pub use_precise: bool,
    pub tag_threshold: f64,
    pub content_threshold: f64,
    pub precise_threshold: f64,
    /// Pairs whose known durations differ by more than this are skipped
    pub duration_tolerance_ms: u64,
}

impl Default for AudioCompareOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

impl AudioCompareOptions {
    /// Every comparator enabled.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            use_tags: true,
            use_content: true,
            use_precise: true,
            tag_threshold: 0.80,
            content_threshold: 0.80,
            precise_threshold: 0.85,
            duration_tolerance_ms: DEFAULT_DURATION_TOLERANCE_MS,
        }
    }

    /// Only the precise comparator, with a strict threshold.
    #[must_use]
    pub fn precise_only() -> Self {
        Self {
            use_tags: false,
            use_content: false,
            use_precise: true,
            tag_threshold: 0.0,
            content_threshold: 0.0,
            precise_threshold: 0.90,
            duration_tolerance_ms: DEFAULT_DURATION_TOLERANCE_MS,
        }
    }

    /// Only the precise comparator, tuned for large libraries.
    #[must_use]
    pub fn large_collection() -> Self {
        Self {
            precise_threshold: 0.85,
            ..Self::precise_only()
        }
    }

    /// Look up a preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] for an unknown preset.
    pub fn preset(name: &str) -> Result<Self, InvalidArgument> {
        match name {
            "default" | "defaults" => Ok(Self::defaults()),
            "precise-only" | "precise_only" => Ok(Self::precise_only()),
            "large-collection" | "large_collection" => Ok(Self::large_collection()),
            other => Err(InvalidArgument::new(format!(
                "unknown audio preset '{other}' (available: defaults, precise-only, large-collection)"
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if a threshold is outside `[0, 1]` or no
    /// comparator is enabled.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        for (name, value) in [
            ("tag_threshold", self.tag_threshold),
            ("content_threshold", self.content_threshold),
            ("precise_threshold", self.precise_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvalidArgument::new(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if !(self.use_tags || self.use_content || self.use_precise) {
            return Err(InvalidArgument::new("at least one audio comparator must be enabled"));
        }
        Ok(())
    }
}

/// An audio file with what the metadata provider and analyzer returned.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioItem {
    pub path: PathBuf,
    pub metadata: AudioMetadata,
    pub analysis: Option<AudioQualityAnalysis>,
}

/// Scores from one pairwise comparison; `None` for comparators that did
/// not run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairScores {
    pub tag: Option<f64>,
    pub content: Option<f64>,
    pub precise: Option<f64>,
}

/// Mean normalized Levenshtein similarity over the title, artist and album
/// tags present on both sides, compared case-insensitively.
///
/// Returns 0.0 when no field can be compared.
#[must_use]
pub fn tag_similarity(a: &AudioMetadata, b: &AudioMetadata) -> f64 {
    fn present(tag: &Option<String>) -> Option<String> {
        tag.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    let pairs = [
        (&a.title, &b.title),
        (&a.artist, &b.artist),
        (&a.album, &b.album),
    ];
    let scores: Vec<f64> = pairs
        .iter()
        .filter_map(|(x, y)| Some((present(x)?, present(y)?)))
        .map(|(x, y)| strsim::normalized_levenshtein(&x, &y))
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

struct Prepared {
    item: AudioItem,
    content: OnceLock<Option<AudioFingerprint>>,
    precise: OnceLock<Option<AudioFingerprint>>,
}

fn fingerprint<'a>(
    slot: &'a OnceLock<Option<AudioFingerprint>>,
    backend: &dyn AudioFingerprinter,
    path: &Path,
) -> Option<&'a AudioFingerprint> {
    slot.get_or_init(|| {
        let computed = backend.compute(path);
        if computed.is_none() {
            log::debug!("No {} fingerprint for {}", backend.algorithm(), path.display());
        }
        computed
    })
    .as_ref()
}

/// Pairwise audio comparison with lazily computed, cached fingerprints.
pub struct AudioMatcher {
    options: AudioCompareOptions,
    content: Option<Arc<dyn AudioFingerprinter>>,
    precise: Option<Arc<dyn AudioFingerprinter>>,
    items: Vec<Prepared>,
}

impl AudioMatcher {
    /// Create a matcher over `items`.
    ///
    /// A comparator is disabled, with one warning, when its fingerprinter is
    /// missing or reports itself unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `options` fail validation.
    pub fn new(
        items: Vec<AudioItem>,
        mut options: AudioCompareOptions,
        content: Option<Arc<dyn AudioFingerprinter>>,
        precise: Option<Arc<dyn AudioFingerprinter>>,
    ) -> Result<Self, InvalidArgument> {
        options.validate()?;

        let usable = |backend: Option<Arc<dyn AudioFingerprinter>>, enabled: &mut bool, what: &str| {
            match backend {
                Some(b) if b.is_available() => Some(b),
                Some(b) => {
                    if *enabled {
                        log::warn!(
                            "{} fingerprinter '{}' is unavailable; {} comparison disabled",
                            what,
                            b.algorithm(),
                            what
                        );
                    }
                    *enabled = false;
                    None
                }
                None => {
                    if *enabled {
                        log::warn!("No {} fingerprinter configured; {} comparison disabled", what, what);
                    }
                    *enabled = false;
                    None
                }
            }
        };
        let content = usable(content, &mut options.use_content, "content");
        let precise = usable(precise, &mut options.use_precise, "precise");

        Ok(Self {
            options,
            content,
            precise,
            items: items
                .into_iter()
                .map(|item| Prepared {
                    item,
                    content: OnceLock::new(),
                    precise: OnceLock::new(),
                })
                .collect(),
        })
    }

    /// Options after disabling comparators with no backend.
    #[must_use]
    pub fn options(&self) -> &AudioCompareOptions {
        &self.options
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the durations of items `a` and `b` are close enough to compare.
    #[must_use]
    pub fn within_duration(&self, a: usize, b: usize) -> bool {
        let da = self.items[a].item.metadata.known_duration_ms();
        let db = self.items[b].item.metadata.known_duration_ms();
        match (da, db) {
            (Some(x), Some(y)) => x.abs_diff(y) <= self.options.duration_tolerance_ms,
            _ => true,
        }
    }

    /// Compare items `a` and `b`; `None` when the duration gate rejects the
    /// pair before any comparator runs.
    #[must_use]
    pub fn compare(&self, a: usize, b: usize) -> Option<PairScores> {
        if !self.within_duration(a, b) {
            log::trace!(
                "Duration gate skipped {} vs {}",
                self.items[a].item.path.display(),
                self.items[b].item.path.display()
            );
            return None;
        }
        let (x, y) = (&self.items[a], &self.items[b]);
        let mut scores = PairScores::default();

        if self.options.use_tags {
            scores.tag = Some(tag_similarity(&x.item.metadata, &y.item.metadata));
        }
        if let Some(backend) = self.content.as_deref() {
            scores.content = Self::fingerprint_score(backend, x, y, |p| &p.content);
        }
        if let Some(backend) = self.precise.as_deref() {
            scores.precise = Self::fingerprint_score(backend, x, y, |p| &p.precise);
        }
        Some(scores)
    }

    fn fingerprint_score(
        backend: &dyn AudioFingerprinter,
        x: &Prepared,
        y: &Prepared,
        slot: fn(&Prepared) -> &OnceLock<Option<AudioFingerprint>>,
    ) -> Option<f64> {
        let fx = fingerprint(slot(x), backend, &x.item.path)?;
        let fy = fingerprint(slot(y), backend, &y.item.path)?;
        match fx.similarity(fy) {
            Ok(score) => Some(score),
            Err(e) => {
                log::warn!("Cannot compare {}: {}", x.item.path.display(), e);
                None
            }
        }
    }

    /// Whether any enabled comparator reached its threshold.
    #[must_use]
    pub fn is_match(&self, scores: &PairScores) -> bool {
        let o = &self.options;
        scores.tag.is_some_and(|s| s >= o.tag_threshold)
            || scores.content.is_some_and(|s| s >= o.content_threshold)
            || scores.precise.is_some_and(|s| s >= o.precise_threshold)
    }

    /// Compare every pair and group matches into connected components.
    ///
    /// Groups are ordered by their first member's input position.
    #[must_use]
    pub fn group(self) -> Vec<AudioDuplicateGroup> {
        let n = self.items.len();
        let edges: Vec<(usize, usize, PairScores)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|a| {
                let this = &self;
                ((a + 1)..n).filter_map(move |b| {
                    let scores = this.compare(a, b)?;
                    this.is_match(&scores).then_some((a, b, scores))
                })
            })
            .collect();
        log::debug!("Audio match graph: {} files, {} matching pairs", n, edges.len());

        let components = connected_components(n, edges.iter().map(|&(a, b, _)| (a, b)));
        let mut component_of = vec![usize::MAX; n];
        for (c, members) in components.iter().enumerate() {
            for &m in members {
                component_of[m] = c;
            }
        }
        let mut best = vec![PairScores::default(); components.len()];
        for (a, _, scores) in &edges {
            let slot = &mut best[component_of[*a]];
            slot.tag = max_option(slot.tag, scores.tag);
            slot.content = max_option(slot.content, scores.content);
            slot.precise = max_option(slot.precise, scores.precise);
        }

        let mut items: Vec<Option<AudioItem>> = self.items.into_iter().map(|p| Some(p.item)).collect();
        components
            .into_iter()
            .zip(best)
            .filter_map(|(members, scores)| {
                let files = members
                    .into_iter()
                    .filter_map(|m| items[m].take())
                    .map(|item| AudioDuplicateFile {
                        path: item.path,
                        metadata: item.metadata,
                        analysis: item.analysis,
                    })
                    .collect();
                AudioDuplicateGroup::new(
                    files,
                    scores.tag.unwrap_or(0.0),
                    scores.content.unwrap_or(0.0),
                    scores.precise.unwrap_or(0.0),
                )
                .map_err(|e| log::warn!("Discarding audio group: {}", e))
                .ok()
            })
            .collect()
    }
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Group audio items with [`AudioMatcher`].
///
/// # Errors
///
/// Returns [`InvalidArgument`] if `options` fail validation.
pub fn group_audio_duplicates(
    items: Vec<AudioItem>,
    options: AudioCompareOptions,
    content: Option<Arc<dyn AudioFingerprinter>>,
    precise: Option<Arc<dyn AudioFingerprinter>>,
) -> Result<Vec<AudioDuplicateGroup>, InvalidArgument> {
    Ok(AudioMatcher::new(items, options, content, precise)?.group())
}
