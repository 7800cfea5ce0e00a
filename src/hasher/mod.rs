//! Content identity hashing.
//!
//! # Overview
//!
//! Every file gets two digests:
//!
//! - a **fast digest** (XXH64, seed 0, 16 hex digits) used as a cheap
//!   pre-filter when partitioning same-size files, and
//! - a **strong digest** (BLAKE3, 64 hex digits) computed only when
//!   fast-digest matches need to be confirmed.
//!
//! Both are computed over the whole file in [`CHUNK_SIZE`] chunks so memory
//! use does not grow with file size. Backends implement [`ContentHasher`]
//! and must produce identical digests for identical bytes; they differ only
//! in how they read the file.
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::hasher::{ContentHasher, StreamingHasher};
//! use std::path::Path;
//!
//! let hasher = StreamingHasher::new();
//! let hashes = hasher.full(Path::new("some_file.txt")).unwrap();
//! println!("{} {:?}", hashes.fast, hashes.strong);
//! ```

pub mod mmap;
pub mod streaming;

use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use twox_hash::XxHash64;

use crate::model::Hashes;

pub use mmap::MmapHasher;
pub use streaming::StreamingHasher;

/// Read buffer size for streaming digests (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Errors that can occur during file hashing.
///
/// Every variant names the file; callers decide whether to skip or abort.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// The file the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::PermissionDenied(path) => path,
            Self::Io { path, .. } => path,
        }
    }
}

/// A backend computing content digests for files.
///
/// Implementations must be interchangeable: the same bytes always produce
/// the same `fast` and `strong` digests regardless of backend.
pub trait ContentHasher: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &str;

    /// Compute the fast digest of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn fast_digest(&self, path: &Path) -> Result<String, HashError>;

    /// Compute the strong digest of a file.
    ///
    /// `Ok(None)` means this backend does not produce strong digests.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn strong_digest(&self, path: &Path) -> Result<Option<String>, HashError>;

    /// Compute both digests.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn full(&self, path: &Path) -> Result<Hashes, HashError> {
        Ok(Hashes {
            fast: self.fast_digest(path)?,
            strong: self.strong_digest(path)?,
        })
    }
}

/// Fast digest of a byte stream, read in [`CHUNK_SIZE`] chunks.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn fast_digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_chunk(&mut reader, &mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.write(&buffer[..n]);
    }
    Ok(fast_hex(hasher.finish()))
}

/// Strong digest of a byte stream, read in [`CHUNK_SIZE`] chunks.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn strong_digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_chunk(&mut reader, &mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Fast digest of an in-memory buffer.
#[must_use]
pub fn fast_digest_bytes(data: &[u8]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    fast_hex(hasher.finish())
}

/// Strong digest of an in-memory buffer.
#[must_use]
pub fn strong_digest_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

pub(crate) fn fast_hex(value: u64) -> String {
    format!("{value:016x}")
}

pub(crate) fn open(path: &Path) -> Result<File, HashError> {
    File::open(path).map_err(|e| HashError::from_io(path, e))
}

fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
