//! Metadata provider interfaces.
//!
//! Providers read image properties, audio tags and recognised text. Each
//! one reports whether its backend is usable through `is_available` so
//! callers can check before use rather than discovering a missing library
//! through a failed read.

use std::path::Path;

use image::ImageFormat;

use crate::model::file::extension_of;
use crate::model::{AudioMetadata, ImageMetadata, OcrResult};

/// Image extensions considered by image similarity searches by default.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif", "raw", "cr2",
    "nef", "arw",
];

/// Audio extensions considered by audio similarity searches by default.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "wma", "ogg", "wav", "flac", "ape", "wv", "mpc", "opus", "tta", "aiff",
    "alac",
];

/// Whether `path` has one of `extensions` (compared lowercase).
#[must_use]
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    let ext = extension_of(path);
    extensions.iter().any(|e| e.as_ref() == ext)
}

/// Reads [`ImageMetadata`].
pub trait ImageMetadataProvider: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn can_handle(&self, path: &Path) -> bool;

    /// Read what the provider can; `None` when the file is unreadable.
    fn read(&self, path: &Path) -> Option<ImageMetadata>;
}

/// Reads [`AudioMetadata`] (format, stream properties and tags).
pub trait AudioMetadataProvider: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, AUDIO_EXTENSIONS)
    }

    fn read(&self, path: &Path) -> Option<AudioMetadata>;
}

/// Recognises text in images.
pub trait OcrProvider: Send + Sync {
    /// Whether the OCR engine is installed.
    fn is_available(&self) -> bool;

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, IMAGE_EXTENSIONS)
    }

    fn read(&self, path: &Path) -> Option<OcrResult>;
}

/// Image metadata from the `image` crate: dimensions and container format.
///
/// EXIF fields (camera, date, GPS) are left empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateMetadata;

impl ImageCrateMetadata {
    /// Registry name of this provider.
    pub const NAME: &'static str = "image";
}

impl ImageMetadataProvider for ImageCrateMetadata {
    fn can_handle(&self, path: &Path) -> bool {
        ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
    }

    fn read(&self, path: &Path) -> Option<ImageMetadata> {
        let (width, height) = match image::image_dimensions(path) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                log::debug!("Cannot read image dimensions for {}: {}", path.display(), e);
                return None;
            }
        };
        let format = ImageFormat::from_path(path)
            .ok()
            .and_then(|f| f.extensions_str().first())
            .map(|ext| (*ext).to_string());

        Some(ImageMetadata {
            format,
            ..ImageMetadata::default().with_dimensions(width, height)
        })
    }
}
