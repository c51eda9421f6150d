//! Structured error handling and exit codes.

use serde::Serialize;

use crate::dedupe::DedupeError;

/// Exit codes for the dupelink application.
///
/// - 0: Success (completed, no per-file errors)
/// - 1: General error (e.g. the index could not be opened)
/// - 2: Usage error (invalid root directory)
/// - 3: Partial success (completed with some non-fatal errors)
/// - 4: Data loss (a duplicate was deleted but its link could not be created)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed without errors.
    Success = 0,
    /// General error: an unexpected or fatal failure.
    GeneralError = 1,
    /// Usage error: the root is missing or not a directory.
    UsageError = 2,
    /// Partial success: completed but some files or directories were skipped.
    PartialSuccess = 3,
    /// Data loss: at least one path lost its content.
    DataLoss = 4,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DL000",
            Self::GeneralError => "DL001",
            Self::UsageError => "DL002",
            Self::PartialSuccess => "DL003",
            Self::DataLoss => "DL004",
            Self::Interrupted => "DL130",
        }
    }

    /// Classify a fatal application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<DedupeError>().is_some() {
            Self::UsageError
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DL001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
