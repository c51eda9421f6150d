//! Concurrent deduplication pipeline.
//!
//! # Overview
//!
//! A run is three stages connected by queues:
//!
//! 1. **Traversal** ([`crate::scanner::Walker`]): emits the absolute path of
//!    every regular file under the root.
//! 2. **Hashing** ([`hashing`]): fingerprints each path and emits a
//!    [`FileRecord`].
//! 3. **Resolution** ([`resolver`]): registers first-seen content in the
//!    [`crate::index::FingerprintIndex`] and replaces later copies with
//!    symbolic links to the registered canonical.
//!
//! Each stage closes its output once its input is exhausted and all of its
//! workers have finished, so the run ends when the resolvers drain.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::dedupe::{DedupeConfig, Deduplicator};
//! use dupelink::index::{Durability, SqliteIndex};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = SqliteIndex::open(Path::new("/tmp/fingerprints.db"), Durability::Full).unwrap();
//! let dedup = Deduplicator::new(Arc::new(index), DedupeConfig::default());
//! let summary = dedup.run(Path::new("/data")).unwrap();
//! println!("linked {} duplicates", summary.duplicates_linked);
//! ```

pub mod hashing;
pub mod locks;
pub mod pipeline;
pub mod resolver;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::actions::LinkError;
use crate::error::ExitCode;
use crate::index::StoreError;
use crate::scanner::{Fingerprint, HashError, ScanError};

pub use locks::FingerprintLocks;
pub use pipeline::{index_side_files, validate_root, DedupeConfig, Deduplicator};
pub use resolver::{Outcome, Resolver};

/// A fingerprinted regular file, produced by the hashing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Content fingerprint
    pub fingerprint: Fingerprint,
    /// Number of bytes hashed
    pub size: u64,
}

/// A non-fatal problem encountered during a run.
#[derive(thiserror::Error, Debug)]
pub enum Issue {
    /// A directory or entry could not be read.
    #[error(transparent)]
    Traversal(#[from] ScanError),

    /// A file could not be fingerprinted.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The index failed for one record.
    #[error("{path}: {source}")]
    Store {
        /// File whose record was being resolved
        path: PathBuf,
        /// Underlying index error
        #[source]
        source: StoreError,
    },

    /// A duplicate could not be replaced.
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl Issue {
    /// Whether this issue left a path without its content.
    #[must_use]
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Self::Link(e) if e.is_data_loss())
    }

    /// Path the issue concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Traversal(e) => e.path(),
            Self::Hash(e) => e.path(),
            Self::Store { path, .. } => path,
            Self::Link(e) => e.path(),
        }
    }

    /// Short label for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Traversal(_) => "traversal",
            Self::Hash(_) => "hash",
            Self::Store { .. } => "index",
            Self::Link(e) if e.is_data_loss() => "data-loss",
            Self::Link(_) => "link",
        }
    }
}

/// Errors that prevent a run from starting.
#[derive(thiserror::Error, Debug)]
pub enum DedupeError {
    /// The root is missing, unreadable, or not a directory.
    #[error("Invalid root {path}: {reason}")]
    InvalidRoot {
        /// Root as given
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },
}

/// Outcome of a completed (or interrupted) run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Root that was processed (absolute)
    pub root: PathBuf,
    /// Directories read
    pub directories: usize,
    /// Regular files found by traversal
    pub files_found: usize,
    /// Files successfully fingerprinted
    pub files_hashed: usize,
    /// Total bytes fingerprinted
    pub bytes_hashed: u64,
    /// Symbolic links encountered and left alone
    pub skipped_symlinks: usize,
    /// Files registered as new canonicals
    pub canonicals: usize,
    /// Files that were already the canonical of their content
    pub already_canonical: usize,
    /// Duplicates replaced by links (or that would be, in a dry run)
    pub duplicates_linked: usize,
    /// Bytes no longer stored twice
    pub bytes_reclaimed: u64,
    /// Every non-fatal problem
    pub issues: Vec<Issue>,
    /// Whether the run was stopped by a shutdown request
    pub interrupted: bool,
    /// Whether no filesystem changes were made
    pub dry_run: bool,
    /// Wall-clock time
    pub duration: Duration,
}

impl RunSummary {
    /// Number of issues that left a path without content.
    #[must_use]
    pub fn data_loss_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_data_loss()).count()
    }

    /// Whether any non-fatal problem occurred.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Process exit code for this summary.
    ///
    /// Data loss outranks an interruption so the exit status never hides it.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.data_loss_count() > 0 {
            ExitCode::DataLoss
        } else if self.interrupted {
            ExitCode::Interrupted
        } else if self.has_issues() {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        }
    }
}
