//! File records and their content hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use crate::error::InvalidArgument;

/// Id carried by records that have not been saved to a store yet.
pub const UNASSIGNED_ID: i64 = -1;

/// Metadata for a discovered file or directory.
///
/// Unique on `path` within a store. Re-observing the same path updates
/// `size`, `modified_at` and `is_directory` in place and keeps `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Store-assigned id, [`UNASSIGNED_ID`] until saved
    pub id: i64,
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
    /// Whether this record describes a directory
    pub is_directory: bool,
}

impl FileRecord {
    /// Create a new, unsaved file record.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified_at` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            path,
            size,
            modified_at,
            is_directory: false,
        }
    }

    /// Create a new, unsaved directory record.
    #[must_use]
    pub fn directory(path: PathBuf, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            path,
            size: 0,
            modified_at,
            is_directory: true,
        }
    }

    /// Build a record from filesystem metadata.
    ///
    /// Falls back to the Unix epoch if the platform cannot report mtime.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();
        Self {
            id: UNASSIGNED_ID,
            path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified_at,
            is_directory: metadata.is_dir(),
        }
    }

    /// Copy of this record carrying the given store id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Whether a store has assigned an id to this record.
    #[must_use]
    pub fn has_id(&self) -> bool {
        self.id != UNASSIGNED_ID
    }

    /// The final path component, or an empty string for root-like paths.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The lowercase extension without the dot, or an empty string.
    #[must_use]
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }
}

/// Lowercase extension of a path without the dot.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Content identity of a file.
///
/// `fast` is always present once computed; `strong` is only filled in when
/// exact-match candidates need disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashes {
    /// Fast digest (lowercase hex)
    pub fast: String,
    /// Strong digest (lowercase hex), if computed
    pub strong: Option<String>,
}

impl Hashes {
    /// Hashes carrying only the fast digest.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if `fast` is empty or not lowercase hex.
    pub fn fast_only(fast: impl Into<String>) -> Result<Self, InvalidArgument> {
        let fast = fast.into();
        validate_hex("fast", &fast)?;
        Ok(Self { fast, strong: None })
    }

    /// Hashes carrying both digests.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if either digest is empty or not lowercase hex.
    pub fn with_strong(
        fast: impl Into<String>,
        strong: impl Into<String>,
    ) -> Result<Self, InvalidArgument> {
        let mut hashes = Self::fast_only(fast)?;
        let strong = strong.into();
        validate_hex("strong", &strong)?;
        hashes.strong = Some(strong);
        Ok(hashes)
    }

    /// Whether the strong digest has been computed.
    #[must_use]
    pub fn has_strong(&self) -> bool {
        self.strong.is_some()
    }
}

fn validate_hex(field: &str, value: &str) -> Result<(), InvalidArgument> {
    if value.is_empty() {
        return Err(InvalidArgument::new(format!("{field} digest must not be empty")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(InvalidArgument::new(format!(
            "{field} digest must be lowercase hex, got '{value}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_new() {
        let record = FileRecord::new(PathBuf::from("/test/file.txt"), 1024, Utc::now());

        assert_eq!(record.id, UNASSIGNED_ID);
        assert!(!record.has_id());
        assert_eq!(record.size, 1024);
        assert!(!record.is_directory);
    }

    #[test]
    fn test_file_record_names() {
        let record = FileRecord::new(PathBuf::from("/photos/IMG_001.JPG"), 1, Utc::now());
        assert_eq!(record.file_name(), "IMG_001.JPG");
        assert_eq!(record.extension(), "jpg");

        let bare = FileRecord::new(PathBuf::from("/bin/README"), 1, Utc::now());
        assert_eq!(bare.extension(), "");
    }

    #[test]
    fn test_file_record_with_id() {
        let record = FileRecord::new(PathBuf::from("/a"), 1, Utc::now()).with_id(42);
        assert!(record.has_id());
        assert_eq!(record.id, 42);
    }

    #[test]
    fn test_directory_record() {
        let record = FileRecord::directory(PathBuf::from("/music"), Utc::now());
        assert!(record.is_directory);
        assert_eq!(record.size, 0);
    }

    #[test]
    fn test_hashes_validation() {
        assert!(Hashes::fast_only("00ff").is_ok());
        assert!(Hashes::fast_only("").is_err());
        assert!(Hashes::fast_only("00FF").is_err());
        assert!(Hashes::fast_only("xyz").is_err());

        let both = Hashes::with_strong("abcd", "0123").unwrap();
        assert!(both.has_strong());
        assert!(Hashes::with_strong("abcd", "").is_err());
    }
}
