//! Scanner module for directory traversal and content fingerprinting.
//!
//! This module provides functionality for:
//! - Parallel directory walking over a bounded pool of traversal workers
//! - Streaming content fingerprints with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and regular-file discovery
//! - [`hasher`]: BLAKE3 file fingerprinting (streaming, 64 KiB buffer)
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let walker = Walker::new(Path::new("/data"), WalkerConfig::default());
//! let stats = walker.walk(&tx);
//! drop(tx);
//!
//! for path in rx {
//!     println!("{}", path.display());
//! }
//! println!("{} directories, {} errors", stats.directories, stats.errors.len());
//! ```

pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, Fingerprint, Hasher, BUFFER_SIZE};
pub use walker::{WalkStats, Walker};

/// Configuration for directory walking.
///
/// Symbolic links are never followed; there is deliberately no option for it.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Number of directories read concurrently.
    pub traversal_workers: usize,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Absolute paths that are never emitted or descended into.
    pub exclude_paths: Vec<PathBuf>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            traversal_workers: 4,
            skip_hidden: false,
            min_size: None,
            ignore_patterns: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Set the number of traversal workers (at least one).
    #[must_use]
    pub fn with_traversal_workers(mut self, workers: usize) -> Self {
        self.traversal_workers = workers.max(1);
        self
    }

    /// Skip hidden files and directories.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Only emit files of at least `min_size` bytes.
    #[must_use]
    pub fn with_min_size(mut self, min_size: Option<u64>) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set gitignore-style ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Add a path that must never be walked.
    #[must_use]
    pub fn with_excluded_path(mut self, path: PathBuf) -> Self {
        self.exclude_paths.push(path);
        self
    }
}

/// Errors that can occur during directory traversal.
///
/// None of these abort a walk: the affected directory or entry is skipped
/// and the walk continues with its siblings.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when reading a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A directory vanished between being queued and being read.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A directory could not be read.
    #[error("Cannot read directory {path}: {source}")]
    ReadDir {
        /// Directory that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Metadata for a single entry could not be read.
    #[error("Cannot inspect {path}: {source}")]
    Entry {
        /// Entry that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify a directory-read failure.
    #[must_use]
    pub fn read_dir(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::ReadDir {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(path) | Self::NotFound(path) => path,
            Self::ReadDir { path, .. } | Self::Entry { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
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

    /// Hashing was abandoned because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),
}

impl HashError {
    /// Classify an I/O failure on `path`.
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

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::PermissionDenied(path) | Self::Interrupted(path) => path,
            Self::Io { path, .. } => path,
        }
    }
}
