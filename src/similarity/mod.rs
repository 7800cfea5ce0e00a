//! Similarity extractors: perceptual image hashes and audio capabilities.

pub mod audio;
pub mod perceptual;

pub use audio::{AudioAnalyzer, AudioFingerprinter, DEFAULT_FINGERPRINT_THRESHOLD};
pub use perceptual::{
    AverageHasher, DifferenceHasher, HammingMetric, PerceptualHasher, PerceptualMethod,
    SimilarityIndex, DEFAULT_IMAGE_THRESHOLD,
};
