//! Progress reporting.
//!
//! The engine reports through the [`ProgressCallback`] trait and never
//! draws anything itself. [`Progress`] is the `indicatif` implementation
//! used by the CLI: a spinner while scanning, then one bar per hashing
//! phase with byte throughput.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receives progress updates from long-running engine operations.
///
/// Phases reported by the engine are `"scan"` (total unknown, reported as
/// 0), `"fast-hash"` and `"strong-hash"`.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts with the number of items, or 0 if unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, with its size in bytes.
    fn on_item_completed(&self, _bytes: u64) {}

    fn on_phase_end(&self, phase: &str);

    /// Replace the status message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter drawing `indicatif` bars on stderr.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    bytes: Mutex<u64>,
    quiet: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Progress {
    /// Create a reporter; `quiet` disables all drawing.
    ///
    /// ```
    /// use dupetrail::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            bytes: Mutex::new(0),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(phase: &str) -> &str {
        match phase {
            "scan" => "Scanning",
            "fast-hash" => "Fast hashing",
            "strong-hash" => "Verifying",
            other => other,
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(Self::label(phase).to_string());
        *lock(&self.bytes) = 0;
        if let Some(previous) = lock(&self.active).replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some(ref pb) = *lock(&self.active) {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if !self.quiet {
            *lock(&self.bytes) += bytes;
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = lock(&self.active).take() {
            let bytes = *lock(&self.bytes);
            pb.finish_with_message(format!(
                "{} complete ({})",
                Self::label(phase),
                bytesize::ByteSize(bytes)
            ));
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(ref pb) = *lock(&self.active) {
            pb.set_message(message.to_string());
        }
    }
}

/// Shorten a path to its file name when it is longer than `max_len` chars.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let len = file_name.chars().count();
    if len + 4 > max_len {
        let tail: String = file_name.chars().skip(len.saturating_sub(max_len - 3)).collect();
        return format!("...{tail}");
    }
    format!(".../{file_name}")
}
