//! Audio signatures, tags, quality statistics and near-duplicate groups.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::InvalidArgument;

/// Fingerprint algorithm name used for content-level comparison.
pub const ALGORITHM_CONTENT: &str = "content";
/// Fingerprint algorithm name used for full-decode comparison.
pub const ALGORITHM_PRECISE: &str = "precise";

/// Opaque audio signature produced by an external fingerprinting backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFingerprint {
    /// Raw signature bytes
    pub data: Vec<u8>,
    /// Algorithm that produced `data`
    pub algorithm: String,
    /// Duration of the fingerprinted audio in whole seconds
    pub duration_seconds: u32,
}

impl AudioFingerprint {
    /// Create a new fingerprint.
    #[must_use]
    pub fn new(data: Vec<u8>, algorithm: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            data,
            algorithm: algorithm.into(),
            duration_seconds,
        }
    }

    /// Fraction of matching bits, in `[0, 1]`.
    ///
    /// Sequences of different (or zero) length score 0.0; no alignment is
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the algorithms differ.
    pub fn similarity(&self, other: &Self) -> Result<f64, InvalidArgument> {
        if self.algorithm != other.algorithm {
            return Err(InvalidArgument::new(format!(
                "cannot compare fingerprints from different algorithms: {} vs {}",
                self.algorithm, other.algorithm
            )));
        }
        if self.data.len() != other.data.len() || self.data.is_empty() {
            return Ok(0.0);
        }

        let differing: u32 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let total = self.data.len() as f64 * 8.0;
        Ok((total - f64::from(differing)) / total)
    }

    /// Whether `similarity(other) >= threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the algorithms differ.
    pub fn is_similar(&self, other: &Self, threshold: f64) -> Result<bool, InvalidArgument> {
        Ok(self.similarity(other)? >= threshold)
    }
}

/// Format and tag information read by an audio metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub format: String,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration in milliseconds, 0 when unknown
    pub duration_ms: u64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
}

impl Default for AudioMetadata {
    fn default() -> Self {
        Self {
            format: "unknown".to_string(),
            bitrate: 0,
            sample_rate: 0,
            channels: 0,
            duration_ms: 0,
            title: None,
            artist: None,
            album: None,
            genre: None,
            year: None,
            track_number: None,
        }
    }
}

impl AudioMetadata {
    /// Whether the stream has two or more channels.
    #[must_use]
    pub fn is_stereo(&self) -> bool {
        self.channels >= 2
    }

    /// Duration in milliseconds, if the provider reported one.
    #[must_use]
    pub fn known_duration_ms(&self) -> Option<u64> {
        (self.duration_ms > 0).then_some(self.duration_ms)
    }
}

/// Acoustic and format statistics for one audio file.
///
/// Produced by an external analyzer; the core only ranks files by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioQualityAnalysis {
    pub sample_rate: u32,
    pub bitrate: u32,
    pub channels: u16,
    pub duration_ms: u64,
    pub format: String,
    pub data_type: String,
    /// Number of clipped samples
    pub clipping: u32,
    /// Number of silent stretches
    pub silence: u32,
    pub abs_mean: f64,
    pub min_step: f64,
    /// Peak absolute amplitude in `[0, 1]`
    pub abs_max: f64,
    /// Highest frequency with meaningful energy, in Hz
    pub max_freq: u32,
    pub clicks: u32,
    /// Scalar quality rating, higher is better
    pub rating: f64,
}

impl Default for AudioQualityAnalysis {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bitrate: 0,
            channels: 2,
            duration_ms: 0,
            format: "unknown".to_string(),
            data_type: "16".to_string(),
            clipping: 0,
            silence: 0,
            abs_mean: 0.0,
            min_step: 0.000_030_517_578_125,
            abs_max: 1.0,
            max_freq: 20_000,
            clicks: 0,
            rating: 1.0,
        }
    }
}

impl AudioQualityAnalysis {
    #[must_use]
    pub fn has_clipping(&self) -> bool {
        self.clipping >= 100
    }

    #[must_use]
    pub fn has_low_bitrate(&self) -> bool {
        self.bitrate > 0 && self.bitrate <= 64_000
    }

    #[must_use]
    pub fn has_low_sample_rate(&self) -> bool {
        self.sample_rate <= 22_050
    }

    #[must_use]
    pub fn has_frequency_cutoff(&self) -> bool {
        self.max_freq > 0 && self.max_freq <= 12_000
    }

    #[must_use]
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }

    #[must_use]
    pub fn has_low_dynamic_range(&self) -> bool {
        self.abs_max <= 0.25
    }

    /// Rating derived from the predicates alone.
    ///
    /// Starts at 1.0 and loses 0.2 per failing predicate, clamped to `[0, 1]`.
    /// Analyzers whose backend reports no rating of its own use this.
    #[must_use]
    pub fn derived_rating(&self) -> f64 {
        let failing = [
            self.has_clipping(),
            self.has_low_bitrate(),
            self.has_low_sample_rate(),
            self.has_frequency_cutoff(),
            self.is_mono(),
            self.has_low_dynamic_range(),
        ]
        .iter()
        .filter(|&&failed| failed)
        .count();
        (1.0 - 0.2 * failing as f64).clamp(0.0, 1.0)
    }
}

/// One member of an [`AudioDuplicateGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDuplicateFile {
    pub path: PathBuf,
    pub metadata: AudioMetadata,
    /// Quality statistics, when an analyzer could handle the file
    pub analysis: Option<AudioQualityAnalysis>,
}

impl AudioDuplicateFile {
    fn rating(&self) -> f64 {
        self.analysis.as_ref().map_or(0.0, |a| a.rating)
    }
}

/// Audio files judged to be the same recording.
///
/// Scores are the best value each comparator produced on any matching pair
/// inside the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AudioGroupFields")]
pub struct AudioDuplicateGroup {
    members: Vec<AudioDuplicateFile>,
    pub tag_score: f64,
    pub content_score: f64,
    pub precise_score: f64,
}

#[derive(Deserialize)]
struct AudioGroupFields {
    members: Vec<AudioDuplicateFile>,
    tag_score: f64,
    content_score: f64,
    precise_score: f64,
}

impl TryFrom<AudioGroupFields> for AudioDuplicateGroup {
    type Error = InvalidArgument;

    fn try_from(fields: AudioGroupFields) -> Result<Self, Self::Error> {
        Self::new(
            fields.members,
            fields.tag_score,
            fields.content_score,
            fields.precise_score,
        )
    }
}

impl AudioDuplicateGroup {
    /// Create a new group.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if there are fewer than two members.
    pub fn new(
        members: Vec<AudioDuplicateFile>,
        tag_score: f64,
        content_score: f64,
        precise_score: f64,
    ) -> Result<Self, InvalidArgument> {
        if members.len() < 2 {
            return Err(InvalidArgument::new(format!(
                "an audio duplicate group must have at least 2 members, got {}",
                members.len()
            )));
        }
        Ok(Self {
            members,
            tag_score,
            content_score,
            precise_score,
        })
    }

    #[must_use]
    pub fn members(&self) -> &[AudioDuplicateFile] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Highest of the three comparator scores.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.tag_score.max(self.content_score).max(self.precise_score)
    }

    /// Member with the highest rating; the first one wins ties.
    ///
    /// Members without an analysis rate as 0.
    #[must_use]
    pub fn best_quality(&self) -> &AudioDuplicateFile {
        let mut best = &self.members[0];
        for member in &self.members[1..] {
            if member.rating() > best.rating() {
                best = member;
            }
        }
        best
    }

    /// Every member except [`AudioDuplicateGroup::best_quality`].
    #[must_use]
    pub fn worst_quality(&self) -> Vec<&AudioDuplicateFile> {
        let best = self.best_quality();
        self.members
            .iter()
            .filter(|m| !std::ptr::eq(*m, best))
            .collect()
    }
}
