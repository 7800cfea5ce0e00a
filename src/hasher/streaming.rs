//! Portable buffered-read hasher.

use std::io::BufReader;
use std::path::Path;

use super::{fast_digest_reader, open, strong_digest_reader, ContentHasher, HashError, CHUNK_SIZE};

/// Reference backend that reads files through a buffered reader.
///
/// Works on every platform and never maps files into memory.
#[derive(Debug, Clone, Default)]
pub struct StreamingHasher;

impl StreamingHasher {
    /// Registry name of this backend.
    pub const NAME: &'static str = "streaming";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for StreamingHasher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fast_digest(&self, path: &Path) -> Result<String, HashError> {
        let reader = BufReader::with_capacity(CHUNK_SIZE, open(path)?);
        let digest = fast_digest_reader(reader).map_err(|e| HashError::from_io(path, e))?;
        log::trace!("fast digest {} {}", digest, path.display());
        Ok(digest)
    }

    fn strong_digest(&self, path: &Path) -> Result<Option<String>, HashError> {
        let reader = BufReader::with_capacity(CHUNK_SIZE, open(path)?);
        let digest = strong_digest_reader(reader).map_err(|e| HashError::from_io(path, e))?;
        log::trace!("strong digest {} {}", digest, path.display());
        Ok(Some(digest))
    }
}
