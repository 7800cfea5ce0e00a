//! Core data model shared by every subsystem.
//!
//! These types are plain values. The [`crate::store`] module owns their
//! on-disk representation; components that hold a [`FileRecord`] must not
//! rely on its `id` until the record has been round-tripped through a store.

pub mod audio;
pub mod file;
pub mod group;
pub mod media;
pub mod operation;
pub mod perceptual;

pub use audio::{
    AudioDuplicateFile, AudioDuplicateGroup, AudioFingerprint, AudioMetadata,
    AudioQualityAnalysis,
};
pub use file::{FileRecord, Hashes, UNASSIGNED_ID};
pub use group::DuplicateGroup;
pub use media::{GpsCoordinates, ImageMetadata, OcrResult};
pub use operation::{Operation, OperationKind, OperationStatus};
pub use perceptual::PerceptualHash;
