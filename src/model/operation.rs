//! Entries of the append-only operation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::InvalidArgument;

/// Kind of mutating filesystem action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Rename,
    Move,
    Copy,
    Delete,
}

impl OperationKind {
    /// Name stored in the `operations.type` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rename => "RENAME",
            Self::Move => "MOVE",
            Self::Copy => "COPY",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RENAME" => Ok(Self::Rename),
            "MOVE" => Ok(Self::Move),
            "COPY" => Ok(Self::Copy),
            "DELETE" => Ok(Self::Delete),
            other => Err(InvalidArgument::new(format!("unknown operation type '{other}'"))),
        }
    }
}

/// Outcome of a logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Success,
    Failed,
}

impl OperationStatus {
    /// Name stored in the `operations.status` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(InvalidArgument::new(format!("unknown operation status '{other}'"))),
        }
    }
}

/// A recorded mutating action.
///
/// Never updated after creation; only removed when undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Store id, `None` until logged
    pub id: Option<i64>,
    pub kind: OperationKind,
    pub source_path: PathBuf,
    pub dest_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub status: OperationStatus,
    /// Human-readable detail, set on failure
    pub details: Option<String>,
}

impl Operation {
    /// A successful action stamped with the current time.
    #[must_use]
    pub fn succeeded(kind: OperationKind, source_path: PathBuf, dest_path: Option<PathBuf>) -> Self {
        Self {
            id: None,
            kind,
            source_path,
            dest_path,
            timestamp: Utc::now(),
            status: OperationStatus::Success,
            details: None,
        }
    }

    /// A failed action stamped with the current time.
    #[must_use]
    pub fn failed(
        kind: OperationKind,
        source_path: PathBuf,
        dest_path: Option<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            status: OperationStatus::Failed,
            details: Some(details.into()),
            ..Self::succeeded(kind, source_path, dest_path)
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}
