//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`ProgressCallback`] trait through which the
//! pipeline reports what it is doing, and the [`Progress`] struct which
//! renders those events as a terminal spinner.
//!
//! All callback methods have empty default implementations, so an observer
//! only overrides the events it cares about. Callbacks are invoked from many
//! worker threads at once.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Observer for pipeline progress.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts (e.g. "dedupe").
    fn on_phase_start(&self, _phase: &str) {}

    /// Called after a directory has been opened for reading.
    fn on_directory(&self, _path: &Path) {}

    /// Called after a file has been fingerprinted.
    ///
    /// # Arguments
    ///
    /// * `path` - File that was hashed
    /// * `bytes` - Number of bytes read
    fn on_file_hashed(&self, _path: &Path, _bytes: u64) {}

    /// Called when a file becomes the canonical copy of its content.
    fn on_canonical(&self, _path: &Path) {}

    /// Called when a duplicate has been replaced by a link (or would be, in a dry run).
    ///
    /// # Arguments
    ///
    /// * `duplicate` - Path that now holds a link
    /// * `canonical` - Link target
    /// * `bytes` - Size of the duplicate's content
    fn on_duplicate(&self, _duplicate: &Path, _canonical: &Path, _bytes: u64) {}

    /// Called for every non-fatal error.
    fn on_error(&self, _path: &Path, _message: &str) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, _phase: &str) {}

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
///
/// Shows a single spinner with running counters for the dedupe run.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    directories: AtomicUsize,
    hashed: AtomicUsize,
    linked: AtomicUsize,
    errors: AtomicUsize,
    bytes_reclaimed: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupelink::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            directories: AtomicUsize::new(0),
            hashed: AtomicUsize::new(0),
            linked: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            bytes_reclaimed: AtomicU64::new(0),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn counters_message(&self) -> String {
        format!(
            "{} dirs, {} hashed, {} linked ({}), {} errors",
            self.directories.load(Ordering::Relaxed),
            self.hashed.load(Ordering::Relaxed),
            self.linked.load(Ordering::Relaxed),
            bytesize::ByteSize::b(self.bytes_reclaimed.load(Ordering::Relaxed)),
            self.errors.load(Ordering::Relaxed)
        )
    }

    fn refresh(&self) {
        if self.quiet {
            return;
        }
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref pb) = *guard {
                pb.set_message(self.counters_message());
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(Self::style());
        pb.set_message(format!("Starting {phase}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(pb);
        }
    }

    fn on_directory(&self, _path: &Path) {
        self.directories.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }

    fn on_file_hashed(&self, _path: &Path, _bytes: u64) {
        self.hashed.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }

    fn on_duplicate(&self, _duplicate: &Path, _canonical: &Path, bytes: u64) {
        self.linked.fetch_add(1, Ordering::Relaxed);
        self.bytes_reclaimed.fetch_add(bytes, Ordering::Relaxed);
        self.refresh();
    }

    fn on_error(&self, _path: &Path, _message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
                log::debug!("{} finished: {}", phase, self.counters_message());
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Ok(guard) = self.bar.lock() {
            if let Some(ref pb) = *guard {
                pb.set_message(truncate_path(message, 60));
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
