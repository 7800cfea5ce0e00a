//! Image and OCR metadata read by external providers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InvalidArgument;

/// Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Image properties; every field is optional because providers differ in
/// what they can read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Container format name, e.g. "png"
    pub format: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub orientation: Option<u16>,
    /// Date the picture was taken
    pub taken_at: Option<NaiveDate>,
    pub gps: Option<GpsCoordinates>,
}

impl ImageMetadata {
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_gps(mut self, latitude: f64, longitude: f64) -> Self {
        self.gps = Some(GpsCoordinates {
            latitude,
            longitude,
        });
        self
    }

    #[must_use]
    pub fn has_gps(&self) -> bool {
        self.gps.is_some()
    }

    /// Pixel count, when both dimensions are known.
    #[must_use]
    pub fn pixels(&self) -> Option<u64> {
        Some(u64::from(self.width?) * u64::from(self.height?))
    }
}

/// Text recognised in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    pub language: String,
}

impl OcrResult {
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `confidence` is outside `[0, 1]`.
    pub fn new(
        text: impl Into<String>,
        confidence: f32,
        language: impl Into<String>,
    ) -> Result<Self, InvalidArgument> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(InvalidArgument::new(format!(
                "OCR confidence must be between 0 and 1, got {confidence}"
            )));
        }
        Ok(Self {
            text: text.into(),
            confidence,
            language: language.into(),
        })
    }

    /// Whether meaningful text was detected.
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty() && self.confidence > 0.1
    }
}
