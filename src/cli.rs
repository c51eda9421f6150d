//! Command-line interface definitions for dupelink.
//!
//! Global options (verbosity, color, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Collapse duplicates under ~/Photos into symlinks
//! dupelink dedupe ~/Photos
//!
//! # See what would happen, with debug logging
//! dupelink -v dedupe ~/Photos --dry-run
//!
//! # Inspect the persistent index
//! dupelink index stats
//! dupelink index lookup ~/Photos/img_0001.jpg
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::LinkStrategy;
use crate::config::Config;
use crate::output::OutputFormat;

/// Replace duplicate files with symbolic links to a single canonical copy.
///
/// dupelink fingerprints file contents with BLAKE3 and remembers the first
/// file seen with each content in a persistent index, so later runs link new
/// copies to the same canonical.
#[derive(Debug, Parser)]
#[command(name = "dupelink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace duplicate files under a directory with symbolic links
    Dedupe(DedupeArgs),
    /// Inspect or reset the fingerprint index
    #[command(subcommand)]
    Index(IndexCommand),
}

/// Location of the fingerprint index.
#[derive(Debug, Clone, Args)]
pub struct IndexLocation {
    /// Path to the fingerprint index database
    ///
    /// If not specified, the configured or platform-default path is used.
    #[arg(long, value_name = "FILE")]
    pub index: Option<PathBuf>,
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Directory to deduplicate
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[command(flatten)]
    pub location: IndexLocation,

    /// Number of hashing workers
    #[arg(long, value_name = "N")]
    pub hash_workers: Option<usize>,

    /// Number of resolver workers
    #[arg(long, value_name = "N")]
    pub resolve_workers: Option<usize>,

    /// Number of directory traversal workers
    #[arg(long, value_name = "N")]
    pub traversal_workers: Option<usize>,

    /// Capacity of the internal path and record queues
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Report duplicates without modifying any file
    ///
    /// First-seen content is still recorded in the index, so a later real run
    /// links against the same canonical copies.
    #[arg(long)]
    pub dry_run: bool,

    /// Re-hash the canonical copy before every link
    ///
    /// Slower, but refuses to link when the canonical changed since it was indexed.
    #[arg(long)]
    pub paranoid: bool,

    /// How a duplicate is swapped for a link
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub link_strategy: Option<LinkStrategy>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl DedupeArgs {
    /// Layer these flags over `config`. Flags that were not given leave the
    /// configured value alone; ignore patterns are appended.
    #[must_use]
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(ref index) = self.location.index {
            config.index_path = Some(index.clone());
        }
        if let Some(n) = self.hash_workers {
            config.hash_workers = n;
        }
        if let Some(n) = self.resolve_workers {
            config.resolve_workers = n;
        }
        if let Some(n) = self.traversal_workers {
            config.traversal_workers = n;
        }
        if let Some(n) = self.queue_capacity {
            config.queue_capacity = n;
        }
        if let Some(strategy) = self.link_strategy {
            config.link_strategy = strategy;
        }
        if self.min_size.is_some() {
            config.min_size = self.min_size;
        }
        config.paranoid |= self.paranoid;
        config.skip_hidden |= self.skip_hidden;
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
        config.normalized()
    }
}

/// Index maintenance subcommands.
#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Show the index location and number of entries
    Stats(IndexLocation),
    /// Fingerprint a file and show its recorded canonical copy
    Lookup(LookupArgs),
    /// Delete every entry from the index
    Clear(ClearArgs),
}

/// Arguments for `index lookup`.
#[derive(Debug, Args)]
pub struct LookupArgs {
    /// File to fingerprint
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub location: IndexLocation,
}

/// Arguments for `index clear`.
#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Confirm that all entries should be removed
    #[arg(short = 'y', long, required = true)]
    pub yes: bool,

    #[command(flatten)]
    pub location: IndexLocation,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupelink::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
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
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
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
