//! Output formatters for run summaries.
//!
//! - [`text`]: colored, human-readable summary (default)
//! - [`json`]: machine-readable report for scripting
//!
//! # Example
//!
//! ```no_run
//! use dupelink::dedupe::RunSummary;
//! use dupelink::output::{json::JsonReport, text::write_summary};
//!
//! let summary = RunSummary::default();
//! write_summary(&mut std::io::stdout(), &summary).unwrap();
//! JsonReport::new(&summary).write_to(&mut std::io::stdout()).unwrap();
//! ```

pub mod json;
pub mod text;

use clap::ValueEnum;

pub use json::{JsonOutputError, JsonReport};
pub use text::write_summary;

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON report
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
