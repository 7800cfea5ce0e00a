//! Structured error handling and exit codes.
//!
//! Every subsystem has its own `thiserror` enum ([`HashError`], [`StoreError`],
//! [`RegistryError`], [`UndoError`]). The public engine operations fold them
//! into [`EngineError`], whose variants are the error kinds callers branch on:
//!
//! | variant | kind |
//! |---|---|
//! | [`EngineError::Hash`], [`EngineError::Io`] | I/O failure on a file path |
//! | [`EngineError::Storage`] | transaction, connection or schema failure |
//! | [`EngineError::InvalidArgument`] | malformed thresholds, empty groups, bad names |
//! | [`EngineError::ProviderUnavailable`] | missing capability or unknown provider |
//! | [`EngineError::Undo`] | target missing, destination occupied, not reversible |

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::actions::{ActionError, UndoError};
use crate::hasher::HashError;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// A value that violates a documented precondition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub String);

impl InvalidArgument {
    /// Create a new invalid-argument error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading a file for hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// A filesystem operation on a path failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The persistent store failed; the current transaction was rolled back.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// A caller-supplied value was rejected.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    /// A requested provider is not registered or not usable.
    #[error("no {capability} provider named '{name}' (available: {})", format_names(.available))]
    ProviderUnavailable {
        /// Capability that was queried (e.g. "hasher")
        capability: String,
        /// Requested provider name
        name: String,
        /// Names registered for that capability
        available: Vec<String>,
    },

    /// The last operation could not be undone.
    #[error(transparent)]
    Undo(UndoError),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound {
                capability,
                name,
                available,
            } => Self::ProviderUnavailable {
                capability: capability.to_string(),
                name,
                available,
            },
            RegistryError::AlreadyRegistered { .. } => {
                Self::InvalidArgument(InvalidArgument::new(err.to_string()))
            }
        }
    }
}

impl From<UndoError> for EngineError {
    fn from(err: UndoError) -> Self {
        match err {
            UndoError::Storage(e) => Self::Storage(e),
            other => Self::Undo(other),
        }
    }
}

impl From<ActionError> for EngineError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Storage(e) => Self::Storage(e),
            ActionError::Io { path, source } => Self::Io { path, source },
            ActionError::SourceMissing(path) => Self::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                path,
            },
            ActionError::TargetExists(path) => Self::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "target already exists",
                ),
                path,
            },
            ActionError::InvalidName(name) => {
                Self::InvalidArgument(InvalidArgument::new(format!("invalid file name '{name}'")))
            }
        }
    }
}

pub(crate) fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Exit codes for the dupetrail binary.
///
/// - 0: Success (command completed, something was found or done)
/// - 1: General error (unexpected failure)
/// - 2: Nothing found (no duplicates, nothing to undo)
/// - 3: Partial success (completed with some per-file failures)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Command completed normally.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Nothing found: Command completed but had nothing to report.
    NothingFound = 2,
    /// Partial success: Completed but some files failed.
    PartialSuccess = 3,
    /// Interrupted: Command was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DT000",
            Self::GeneralError => "DT001",
            Self::NothingFound => "DT002",
            Self::PartialSuccess => "DT003",
            Self::Interrupted => "DT130",
        }
    }

    /// Pick the exit code for a finished command from its failure count.
    #[must_use]
    pub fn from_counts(succeeded: usize, failed: usize, interrupted: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if failed > 0 {
            Self::PartialSuccess
        } else if succeeded == 0 {
            Self::NothingFound
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DT001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
