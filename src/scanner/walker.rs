//! Directory walker with a bounded pool of traversal workers.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating every regular
//! file under a root directory. Directories are read by a fixed number of
//! worker threads that share one queue of pending directories; each worker
//! pushes newly discovered subdirectories back onto that queue and sends
//! regular-file paths to the caller's channel.
//!
//! # Completion
//!
//! An outstanding-directory counter starts at one (the root). It is
//! incremented before a subdirectory is queued and decremented after a
//! directory has been fully processed, so it can only reach zero once every
//! subtree, including subtrees discovered late, has finished. Idle workers
//! poll the queue and exit when they observe zero.
//!
//! # Features
//!
//! - Symbolic links are never followed, hashed, or recursed into
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Minimum-size and hidden-file filters
//! - Unreadable directories are reported and skipped
//! - Graceful shutdown via atomic flag

use std::ffi::OsStr;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::{ScanError, WalkerConfig};
use crate::progress::ProgressCallback;

/// How long an idle traversal worker waits before re-checking completion.
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Counters and errors collected during one walk.
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Directories read (including the root)
    pub directories: usize,
    /// Regular files emitted
    pub files: usize,
    /// Symbolic links encountered and skipped
    pub skipped_symlinks: usize,
    /// FIFOs, sockets, devices and other special files skipped
    pub skipped_special: usize,
    /// Non-fatal traversal errors
    pub errors: Vec<ScanError>,
    /// Whether the walk stopped early because of shutdown
    pub interrupted: bool,
}

impl WalkStats {
    fn merge(&mut self, other: WalkStats) {
        self.directories += other.directories;
        self.files += other.files;
        self.skipped_symlinks += other.skipped_symlinks;
        self.skipped_special += other.skipped_special;
        self.errors.extend(other.errors);
        self.interrupted |= other.interrupted;
    }
}

/// Directory walker for parallel regular-file discovery.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root directory.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// Once the flag is set, queued directories are drained without being
    /// read and no further paths are emitted.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the ignore matcher from config patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Check if a path should be ignored based on configured patterns.
    fn should_ignore(&self, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };

        // Gitignore matching expects paths relative to the root with forward slashes.
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        let path_str = relative_path.to_string_lossy();
        let normalized_path = if cfg!(windows) {
            path_str.replace('\\', "/")
        } else {
            path_str.into_owned()
        };

        gi.matched(normalized_path, is_dir).is_ignore()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.config.exclude_paths.iter().any(|p| p == path)
    }

    /// Walk the tree, sending every regular file's path to `sink`.
    ///
    /// Blocks until the whole tree has been traversed (or shutdown was
    /// requested, or `sink` was disconnected). The caller keeps ownership of
    /// the sender and decides when to drop it.
    pub fn walk(&self, sink: &Sender<PathBuf>) -> WalkStats {
        let gitignore = self.build_gitignore();
        let workers = self.config.traversal_workers.max(1);

        // Pending directories. Unbounded because the workers themselves feed it.
        let (dir_tx, dir_rx) = channel::unbounded::<PathBuf>();
        let in_flight = AtomicUsize::new(1);
        let _ = dir_tx.send(self.root.clone());

        log::debug!(
            "Walking {} with {} traversal workers",
            self.root.display(),
            workers
        );

        let mut stats = WalkStats::default();
        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let dir_rx = &dir_rx;
                    let dir_tx = &dir_tx;
                    let in_flight = &in_flight;
                    let gitignore = gitignore.as_ref();
                    s.spawn(move || self.traversal_worker(dir_rx, dir_tx, sink, in_flight, gitignore))
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(local) => stats.merge(local),
                    Err(_) => log::error!("Traversal worker panicked"),
                }
            }
        });

        log::debug!(
            "Walk complete: {} directories, {} files, {} symlinks skipped, {} errors",
            stats.directories,
            stats.files,
            stats.skipped_symlinks,
            stats.errors.len()
        );

        stats
    }

    /// Worker loop: pull a directory, process it, mark it finished.
    fn traversal_worker(
        &self,
        dir_rx: &Receiver<PathBuf>,
        dir_tx: &Sender<PathBuf>,
        sink: &Sender<PathBuf>,
        in_flight: &AtomicUsize,
        gitignore: Option<&Gitignore>,
    ) -> WalkStats {
        let mut local = WalkStats::default();

        loop {
            match dir_rx.recv_timeout(IDLE_POLL) {
                Ok(dir) => {
                    if self.is_shutdown_requested() {
                        local.interrupted = true;
                    } else {
                        self.process_directory(&dir, dir_tx, sink, in_flight, gitignore, &mut local);
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if in_flight.load(Ordering::SeqCst) == 0 {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        local
    }

    /// Read one directory: queue subdirectories, emit regular files.
    fn process_directory(
        &self,
        dir: &Path,
        dir_tx: &Sender<PathBuf>,
        sink: &Sender<PathBuf>,
        in_flight: &AtomicUsize,
        gitignore: Option<&Gitignore>,
        local: &mut WalkStats,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                let err = ScanError::read_dir(dir, e);
                log::warn!("Skipping directory: {}", err);
                self.report_error(dir, &err);
                local.errors.push(err);
                return;
            }
        };

        local.directories += 1;
        if let Some(ref callback) = self.progress_callback {
            callback.on_directory(dir);
        }

        for entry_result in entries {
            if self.is_shutdown_requested() {
                local.interrupted = true;
                return;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let err = ScanError::Entry {
                        path: dir.to_path_buf(),
                        source: e,
                    };
                    log::warn!("{}", err);
                    self.report_error(dir, &err);
                    local.errors.push(err);
                    continue;
                }
            };

            let path = entry.path();

            // DirEntry::file_type does not traverse symlinks.
            let file_type: FileType = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    let err = ScanError::Entry {
                        path: path.clone(),
                        source: e,
                    };
                    log::warn!("{}", err);
                    self.report_error(&path, &err);
                    local.errors.push(err);
                    continue;
                }
            };

            if self.is_excluded(&path) {
                log::trace!("Excluded: {}", path.display());
                continue;
            }

            if self.config.skip_hidden && is_hidden(&entry.file_name()) {
                log::trace!("Skipping hidden: {}", path.display());
                continue;
            }

            if file_type.is_symlink() {
                log::trace!("Skipping symlink: {}", path.display());
                local.skipped_symlinks += 1;
                continue;
            }

            if file_type.is_dir() {
                if self.should_ignore(&path, true, gitignore) {
                    log::trace!("Ignoring directory: {}", path.display());
                    continue;
                }
                in_flight.fetch_add(1, Ordering::SeqCst);
                if dir_tx.send(path).is_err() {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                continue;
            }

            if !file_type.is_file() {
                log::trace!("Skipping special file: {}", path.display());
                local.skipped_special += 1;
                continue;
            }

            if self.should_ignore(&path, false, gitignore) {
                log::trace!("Ignoring file: {}", path.display());
                continue;
            }

            if let Some(min) = self.config.min_size {
                match entry.metadata() {
                    Ok(meta) if meta.len() < min => {
                        log::trace!("Skipping small file ({} bytes): {}", meta.len(), path.display());
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let err = ScanError::Entry {
                            path: path.clone(),
                            source: e,
                        };
                        log::warn!("{}", err);
                        self.report_error(&path, &err);
                        local.errors.push(err);
                        continue;
                    }
                }
            }

            local.files += 1;
            if sink.send(path).is_err() {
                log::debug!("Walker: path consumer gone, stopping");
                local.interrupted = true;
                return;
            }
        }
    }

    fn report_error(&self, path: &Path, err: &ScanError) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_error(path, &err.to_string());
        }
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
