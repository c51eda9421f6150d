//! JSON report for a dedupe run.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "root": "/data",
//!   "dry_run": false,
//!   "interrupted": false,
//!   "exit_code": 0,
//!   "exit_code_name": "DL000",
//!   "directories": 12,
//!   "files_found": 120,
//!   "files_hashed": 120,
//!   "bytes_hashed": 1048576,
//!   "skipped_symlinks": 3,
//!   "canonicals": 80,
//!   "already_canonical": 10,
//!   "duplicates_linked": 30,
//!   "bytes_reclaimed": 65536,
//!   "duration_ms": 1234,
//!   "issues": [
//!     { "kind": "traversal", "path": "/data/locked", "message": "Permission denied: /data/locked" }
//!   ]
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::dedupe::{Issue, RunSummary};

/// One issue in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonIssue {
    /// Error class ("traversal", "hash", "index", "link", "data-loss")
    pub kind: &'static str,
    /// Path concerned
    pub path: String,
    /// Human-readable message
    pub message: String,
}

impl From<&Issue> for JsonIssue {
    fn from(issue: &Issue) -> Self {
        Self {
            kind: issue.kind(),
            path: issue.path().to_string_lossy().into_owned(),
            message: issue.to_string(),
        }
    }
}

/// Serializable view of a [`RunSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    /// Root that was processed
    pub root: String,
    /// Whether the run was a dry run
    pub dry_run: bool,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DL000")
    pub exit_code_name: &'static str,
    /// Directories read
    pub directories: usize,
    /// Regular files found
    pub files_found: usize,
    /// Files fingerprinted
    pub files_hashed: usize,
    /// Bytes fingerprinted
    pub bytes_hashed: u64,
    /// Symbolic links left alone
    pub skipped_symlinks: usize,
    /// New canonicals registered
    pub canonicals: usize,
    /// Files already registered as canonical
    pub already_canonical: usize,
    /// Duplicates replaced by links
    pub duplicates_linked: usize,
    /// Bytes no longer stored twice
    pub bytes_reclaimed: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Non-fatal problems
    pub issues: Vec<JsonIssue>,
}

impl JsonReport {
    /// Build a report from a run summary.
    #[must_use]
    pub fn new(summary: &RunSummary) -> Self {
        let exit_code = summary.exit_code();
        Self {
            root: summary.root.to_string_lossy().into_owned(),
            dry_run: summary.dry_run,
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
            directories: summary.directories,
            files_found: summary.files_found,
            files_hashed: summary.files_hashed,
            bytes_hashed: summary.bytes_hashed,
            skipped_symlinks: summary.skipped_symlinks,
            canonicals: summary.canonicals,
            already_canonical: summary.already_canonical,
            duplicates_linked: summary.duplicates_linked,
            bytes_reclaimed: summary.bytes_reclaimed,
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            issues: summary.issues.iter().map(JsonIssue::from).collect(),
        }
    }

    /// Write the report as pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error while writing JSON: {0}")]
    Io(#[from] std::io::Error),
}
