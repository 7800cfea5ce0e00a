//! Memory-mapped hasher for large files.
//!
//! Files at or above the threshold get their strong digest from BLAKE3's
//! own memory-mapped, rayon-parallel update. The fast digest is always
//! streamed. Smaller and empty files go through the streaming path, so
//! digests stay identical to [`StreamingHasher`](super::StreamingHasher).

use std::fs;
use std::path::Path;

use super::{ContentHasher, HashError, StreamingHasher};

/// Default size at which files are memory-mapped (16 MiB).
pub const DEFAULT_MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Accelerated backend using memory-mapped I/O.
#[derive(Debug, Clone)]
pub struct MmapHasher {
    threshold: u64,
    fallback: StreamingHasher,
}

impl Default for MmapHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl MmapHasher {
    /// Registry name of this backend.
    pub const NAME: &'static str = "mmap";

    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_MMAP_THRESHOLD,
            fallback: StreamingHasher::new(),
        }
    }

    /// Set the minimum file size that is memory-mapped.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    fn wants_map(&self, path: &Path) -> Result<bool, HashError> {
        let len = fs::metadata(path)
            .map_err(|e| HashError::from_io(path, e))?
            .len();
        Ok(len > 0 && len >= self.threshold)
    }
}

impl ContentHasher for MmapHasher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fast_digest(&self, path: &Path) -> Result<String, HashError> {
        self.fallback.fast_digest(path)
    }

    fn strong_digest(&self, path: &Path) -> Result<Option<String>, HashError> {
        if !self.wants_map(path)? {
            return self.fallback.strong_digest(path);
        }
        let mut hasher = blake3::Hasher::new();
        hasher
            .update_mmap_rayon(path)
            .map_err(|e| HashError::from_io(path, e))?;
        log::trace!("mapped strong digest {}", path.display());
        Ok(Some(hasher.finalize().to_hex().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mmap_matches_streaming() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("large_file.bin");
        let content: Vec<u8> = (0..1024 * 1024).map(|i| (i % 253) as u8).collect();
        fs::write(&path, &content).unwrap();

        let streaming = StreamingHasher::new();
        let mmap = MmapHasher::new().with_threshold(512 * 1024);

        assert_eq!(streaming.full(&path).unwrap(), mmap.full(&path).unwrap());
    }

    #[test]
    fn test_mmap_below_threshold_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small_file.bin");
        fs::write(&path, b"small content").unwrap();

        let hasher = MmapHasher::new().with_threshold(1024 * 1024);
        let strong = hasher.strong_digest(&path).unwrap();
        assert_eq!(strong, Some(blake3::hash(b"small content").to_hex().to_string()));
    }

    #[test]
    fn test_mmap_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let hasher = MmapHasher::new().with_threshold(0);
        assert_eq!(
            hasher.full(&path).unwrap(),
            StreamingHasher::new().full(&path).unwrap()
        );
    }

    #[test]
    fn test_mmap_fast_digest_is_streamed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapped.bin");
        let content = vec![0xa5u8; 64 * 1024];
        fs::write(&path, &content).unwrap();

        let hasher = MmapHasher::new().with_threshold(1);
        assert_eq!(
            hasher.fast_digest(&path).unwrap(),
            crate::hasher::fast_digest_bytes(&content)
        );
        assert_eq!(
            hasher.strong_digest(&path).unwrap(),
            Some(blake3::hash(&content).to_hex().to_string())
        );
    }

    #[test]
    fn test_mmap_missing_file() {
        let hasher = MmapHasher::new().with_threshold(0);
        assert!(hasher.full(Path::new("non_existent_file_12345.bin")).is_err());
    }
}
