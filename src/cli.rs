//! Command-line interface definitions for dupetrail.
//!
//! The binary is a thin dispatcher over [`crate::engine::Engine`]. Global
//! options select the configuration file, the database and the output
//! format; subcommands map one-to-one onto engine operations.
//!
//! # Example
//!
//! ```bash
//! # Record every file under two roots
//! dupetrail scan ~/Pictures /mnt/backup/Pictures
//!
//! # Find exact duplicates among recorded files, as JSON Lines
//! dupetrail --output json duplicates
//!
//! # See what keeping the oldest copy would delete, then do it
//! dupetrail delete-duplicates --keep oldest
//! dupetrail delete-duplicates --keep oldest --confirm
//!
//! # Sort downloads into year/month folders, then take the last move back
//! dupetrail organize ~/Downloads ~/Sorted --by date --confirm
//! dupetrail undo
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::{KeepStrategy, OrganizeBy, RenamePattern, DEFAULT_DATE_FORMAT};
use crate::duplicates::AudioCompareOptions;
use crate::engine::EngineConfig;
use crate::output::OutputFormat;
use crate::similarity::PerceptualMethod;

/// Duplicate file detection with a reversible operation log.
///
/// Scans are recorded in a local SQLite database; later commands work on
/// what was recorded.
#[derive(Debug, Parser)]
#[command(name = "dupetrail")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: config.toml in the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, value_name = "FILE", global = true, env = "DUPETRAIL_DATABASE")]
    pub database: Option<PathBuf>,

    /// Worker threads (0 = one per CPU)
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enumerate directories and record their files
    Scan(ScanArgs),
    /// Find exact duplicates among recorded files
    Duplicates(DuplicatesArgs),
    /// Find near-duplicate images or audio
    Similar(SimilarArgs),
    /// Delete all but one copy in every duplicate group
    DeleteDuplicates(DeleteArgs),
    /// Rename files with a name pattern
    Rename(RenameArgs),
    /// Move or copy files into folders by date, extension or size
    Organize(OrganizeArgs),
    /// Print file digests without recording anything
    Hash(HashArgs),
    /// Reverse the most recent file operation
    Undo,
    /// List recorded file operations, newest first
    History(HistoryArgs),
    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories (or files) to scan
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Only record files with these extensions (comma separated)
    #[arg(short, long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Follow symbolic links during the scan
    #[arg(long)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Trust the fast digest alone and skip strong verification
    #[arg(long)]
    pub no_verify: bool,

    /// Content hasher (streaming or mmap)
    #[arg(long, value_name = "NAME")]
    pub hasher: Option<String>,
}

#[derive(Debug, Args)]
pub struct SimilarArgs {
    #[command(subcommand)]
    pub kind: SimilarKind,
}

#[derive(Debug, Subcommand)]
pub enum SimilarKind {
    /// Group visually similar images, or rank images against a reference
    Image(ImageArgs),
    /// Group audio files that are the same recording
    Audio(AudioArgs),
}

#[derive(Debug, Args)]
pub struct ImageArgs {
    /// Rank recorded images by distance to this image instead of grouping
    #[arg(long, value_name = "IMAGE")]
    pub reference: Option<PathBuf>,

    /// Maximum Hamming distance (0-64)
    #[arg(long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub threshold: Option<u32>,

    /// Perceptual hash method
    #[arg(long, value_name = "METHOD")]
    pub method: Option<PerceptualMethod>,
}

#[derive(Debug, Args)]
pub struct AudioArgs {
    /// Start from a preset: default, precise-only or large-collection
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Skip tag comparison
    #[arg(long)]
    pub no_tags: bool,

    /// Skip content fingerprint comparison
    #[arg(long)]
    pub no_content: bool,

    /// Skip precise fingerprint comparison
    #[arg(long)]
    pub no_precise: bool,

    #[arg(long, value_name = "0-1")]
    pub tag_threshold: Option<f64>,

    #[arg(long, value_name = "0-1")]
    pub content_threshold: Option<f64>,

    #[arg(long, value_name = "0-1")]
    pub precise_threshold: Option<f64>,

    /// Maximum duration difference in milliseconds
    #[arg(long, value_name = "MS")]
    pub duration_tolerance: Option<u64>,
}

impl AudioArgs {
    /// Options from the preset (or `base`) with the flags applied.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown preset name.
    pub fn options(&self, base: AudioCompareOptions) -> Result<AudioCompareOptions, String> {
        let mut options = match self.preset {
            Some(ref name) => AudioCompareOptions::preset(name).map_err(|e| e.to_string())?,
            None => base,
        };
        if self.no_tags {
            options.use_tags = false;
        }
        if self.no_content {
            options.use_content = false;
        }
        if self.no_precise {
            options.use_precise = false;
        }
        if let Some(t) = self.tag_threshold {
            options.tag_threshold = t;
        }
        if let Some(t) = self.content_threshold {
            options.content_threshold = t;
        }
        if let Some(t) = self.precise_threshold {
            options.precise_threshold = t;
        }
        if let Some(ms) = self.duration_tolerance {
            options.duration_tolerance_ms = ms;
        }
        Ok(options)
    }
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Which copy to keep: oldest, newest, shortest, longest or first
    #[arg(long, value_name = "STRATEGY", default_value_t = KeepStrategy::First)]
    pub keep: KeepStrategy,

    /// Actually delete; without this flag only a dry run is shown
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Directories (or files) whose files are renamed
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// New name; placeholders: {name}, {ext}, {parent}, {date}, {counter}
    #[arg(short, long, value_name = "PATTERN")]
    pub pattern: RenamePattern,

    /// Only rename files with these extensions (comma separated)
    #[arg(short, long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Actually rename; without this flag only a dry run is shown
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Debug, Args)]
pub struct OrganizeArgs {
    /// Directory whose files are organised
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Root of the folder tree to create
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Folder rule: date, extension or size
    #[arg(long, value_name = "RULE", default_value_t = OrganizeBy::Date)]
    pub by: OrganizeBy,

    /// strftime layout of date folders
    #[arg(long, value_name = "FORMAT", default_value = DEFAULT_DATE_FORMAT)]
    pub date_format: String,

    /// Copy instead of move
    #[arg(long)]
    pub copy: bool,

    /// Only organise files with these extensions (comma separated)
    #[arg(short, long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Actually move or copy; without this flag only a dry run is shown
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    /// Files or directories to hash
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Only hash files with these extensions (comma separated)
    #[arg(short, long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Skip the strong digest
    #[arg(long)]
    pub fast_only: bool,

    /// Content hasher (streaming or mmap)
    #[arg(long, value_name = "NAME")]
    pub hasher: Option<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of operations to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Where to write it (default: the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    Show,
}

impl Cli {
    /// Apply global and subcommand flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(ref database) = self.database {
            config.database = database.clone();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        match &self.command {
            Commands::Scan(args) if args.follow_symlinks => config.follow_symlinks = true,
            Commands::Duplicates(args) => {
                if let Some(min_size) = args.min_size {
                    config.min_size = min_size;
                }
                if args.no_verify {
                    config.verify_with_strong_hash = false;
                }
                if let Some(ref hasher) = args.hasher {
                    config.hasher = hasher.clone();
                }
            }
            Commands::Hash(HashArgs {
                hasher: Some(hasher),
                ..
            }) => config.hasher = hasher.clone(),
            Commands::Similar(SimilarArgs {
                kind: SimilarKind::Image(args),
            }) => {
                if let Some(threshold) = args.threshold {
                    config.image_threshold = threshold;
                }
                if let Some(method) = args.method {
                    config.perceptual = method.as_str().to_string();
                }
            }
            _ => {}
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupetrail::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// or has an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };
    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
