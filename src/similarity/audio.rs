//! Audio capabilities consumed from external backends.
//!
//! The core does not decode audio. Fingerprinting and quality analysis are
//! provided by registered implementations of these traits; the matcher in
//! [`crate::duplicates::near`] only compares what they return.

use std::path::Path;

use crate::model::{AudioFingerprint, AudioQualityAnalysis};

/// Default minimum similarity for two fingerprints to match.
pub const DEFAULT_FINGERPRINT_THRESHOLD: f64 = 0.85;

/// Produces [`AudioFingerprint`]s for audio files.
pub trait AudioFingerprinter: Send + Sync {
    /// Algorithm name stamped on every fingerprint.
    fn algorithm(&self) -> &str;

    /// Fingerprint the file, `None` when it cannot be decoded.
    fn compute(&self, path: &Path) -> Option<AudioFingerprint>;

    /// Whether the backend is installed and usable.
    fn is_available(&self) -> bool {
        true
    }

    fn default_threshold(&self) -> f64 {
        DEFAULT_FINGERPRINT_THRESHOLD
    }
}

/// Produces [`AudioQualityAnalysis`] records for audio files.
pub trait AudioAnalyzer: Send + Sync {
    fn can_handle(&self, path: &Path) -> bool;

    /// Analyze the file, `None` when it cannot be decoded.
    fn analyze(&self, path: &Path) -> Option<AudioQualityAnalysis>;

    /// Whether the backend is installed and usable.
    fn is_available(&self) -> bool {
        true
    }
}
