//! Output formatters for command results.
//!
//! This module provides two formats:
//! - Text for humans, with sizes rendered by `bytesize`
//! - JSON Lines for automation: one `serde_json` object per line, each
//!   tagged with a `"type"` field
//!
//! # Example
//!
//! ```no_run
//! use dupetrail::output::{Output, OutputFormat};
//! use dupetrail::engine::{Engine, EngineConfig};
//! use dupetrail::registry::Providers;
//! use std::sync::Arc;
//!
//! let engine = Engine::open(EngineConfig::default(), Arc::new(Providers::with_defaults().unwrap())).unwrap();
//! let report = engine.find_exact_duplicates().unwrap();
//! let mut out = Output::new(OutputFormat::Json, std::io::stdout().lock());
//! out.exact_report(&report).unwrap();
//! ```

pub mod json;
pub mod text;

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::actions::{BatchReport, DeletePlan, DeleteReport, UndoOutcome};
use crate::duplicates::SimilarMatch;
use crate::engine::{ExactReport, HashReport, NearReport, ScanReport};
use crate::model::Operation;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON Lines, one record per line
    Json,
}

/// Writes command results in the selected format.
pub struct Output<W: Write> {
    format: OutputFormat,
    writer: W,
}

impl<W: Write> Output<W> {
    pub fn new(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Give back the writer (used by tests to inspect what was written).
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn scan_report(&mut self, report: &ScanReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::scan_report(&mut self.writer, report),
            OutputFormat::Json => json::scan_report(&mut self.writer, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn exact_report(&mut self, report: &ExactReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::exact_report(&mut self.writer, report),
            OutputFormat::Json => json::exact_report(&mut self.writer, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn near_report(&mut self, report: &NearReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::near_report(&mut self.writer, report),
            OutputFormat::Json => json::near_report(&mut self.writer, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn similar_matches(&mut self, reference: &Path, matches: &[SimilarMatch]) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::similar_matches(&mut self.writer, reference, matches),
            OutputFormat::Json => json::similar_matches(&mut self.writer, reference, matches),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn delete_report(&mut self, plan: &DeletePlan, report: &DeleteReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::delete_report(&mut self.writer, plan, report),
            OutputFormat::Json => json::delete_report(&mut self.writer, plan, report),
        }
    }

    /// `verb` names the action in summaries ("rename", "move", "copy").
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn batch_report(&mut self, verb: &str, report: &BatchReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::batch_report(&mut self.writer, verb, report),
            OutputFormat::Json => json::batch_report(&mut self.writer, verb, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn hash_report(&mut self, report: &HashReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::hash_report(&mut self.writer, report),
            OutputFormat::Json => json::hash_report(&mut self.writer, report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn undo(&mut self, outcome: &UndoOutcome) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::undo(&mut self.writer, outcome),
            OutputFormat::Json => json::undo(&mut self.writer, outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn history(&mut self, operations: &[Operation]) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => text::history(&mut self.writer, operations),
            OutputFormat::Json => json::history(&mut self.writer, operations),
        }
    }
}
