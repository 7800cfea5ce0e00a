//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file grouping (Phase 1)
//! - Fast digest bucketing and strong verification (Phases 2 and 3)
//! - Near-duplicate grouping for images and audio
//! - Connected-components grouping shared by all matchers

pub mod components;
pub mod exact;
pub mod groups;
pub mod near;

pub use components::{connected_components, group_by, UnionFind};
pub use exact::{ExactConfig, ExactFinder, ExactMatch, ExactOutcome, ExactStats, DEFAULT_MIN_SIZE};
pub use groups::{group_by_size, GroupingStats, IndexedFile};
pub use near::{
    find_similar, group_audio_duplicates, group_similar_images, tag_similarity,
    AudioCompareOptions, AudioItem, AudioMatcher, ImageGroup, PairScores, SimilarMatch,
    DEFAULT_DURATION_TOLERANCE_MS,
};
