//! Persistent fingerprint index.
//!
//! The index maps every content fingerprint ever observed to the path of the
//! first file seen with that content (its *canonical* copy). It survives
//! between runs, which is what makes repeated runs idempotent: a file whose
//! content is already known is linked to the remembered canonical instead of
//! becoming a canonical of its own.
//!
//! # Architecture
//!
//! * [`FingerprintIndex`]: the capability handed to resolver workers. It has a
//!   single atomic operation, [`FingerprintIndex::lookup_or_insert`].
//! * [`database`]: the SQLite implementation, [`SqliteIndex`].
//!
//! # Atomicity
//!
//! For any one fingerprint, lookup and insert happen as one step: when several
//! callers race on the same fingerprint, exactly one of them observes
//! `inserted == true` and all of them observe the same `existing` path.

pub mod database;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::Fingerprint;

pub use database::{SqliteIndex, SCHEMA_VERSION};

/// Result of [`FingerprintIndex::lookup_or_insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// The canonical path now associated with the fingerprint.
    pub existing: PathBuf,
    /// `true` if this call created the entry.
    pub inserted: bool,
}

/// Atomic insert-if-absent map from fingerprint to canonical path.
pub trait FingerprintIndex: Send + Sync {
    /// Return the canonical path for `fingerprint`, registering `path` as the
    /// canonical if none exists yet.
    ///
    /// An insertion is durable (per the index's configured [`Durability`])
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store cannot be read or written.
    fn lookup_or_insert(
        &self,
        fingerprint: &Fingerprint,
        path: &std::path::Path,
    ) -> Result<Lookup, StoreError>;
}

/// How hard the index works to survive power loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Every insert is synced to disk before it is acknowledged.
    #[default]
    Full,
    /// WAL with relaxed syncing. A crash may lose the most recent inserts but
    /// never corrupts the index.
    Normal,
}

impl Durability {
    pub(crate) fn synchronous_pragma(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Errors from the fingerprint index.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The database could not be opened or initialized.
    #[error("Cannot open fingerprint index {path}: {source}")]
    Open {
        /// Database file
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The directory holding the database could not be created.
    #[error("Cannot create index directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The database was written by a newer version of this tool.
    #[error("Index schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema {
        /// Version found in the file
        found: i64,
        /// Highest version this build understands
        supported: i64,
    },

    /// A query failed.
    #[error("Index query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A connection mutex was poisoned by a panicking worker.
    #[error("Index connection lock poisoned")]
    Lock,
}

impl StoreError {
    /// Whether this error prevents the index from being used at all.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::CreateDir { .. } | Self::UnsupportedSchema { .. }
        )
    }
}
