//! dupelink - collapse duplicate files into symbolic links
//!
//! Walks a directory tree, fingerprints every regular file with BLAKE3, and
//! replaces each file whose content has been seen before with a symbolic link
//! to the first copy. The first copy of each content is remembered in a
//! persistent SQLite index, so repeated runs converge instead of relinking.

pub mod actions;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, DedupeArgs, IndexCommand, IndexLocation};
use crate::config::Config;
use crate::dedupe::{index_side_files, validate_root, DedupeConfig, Deduplicator};
use crate::error::ExitCode;
use crate::index::SqliteIndex;
use crate::output::{JsonReport, OutputFormat};
use crate::progress::Progress;
use crate::scanner::{hash_to_hex, Hasher, WalkerConfig};

/// Run the application for parsed command-line arguments.
///
/// Returns the exit code for completed commands. Fatal errors (invalid root,
/// unusable index, bad configuration) are returned as `Err`; use
/// [`ExitCode::for_error`] to map them.
///
/// # Errors
///
/// See above.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, !cli.no_color);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Dedupe(args) => run_dedupe(&args, config, cli.quiet),
        Commands::Index(command) => run_index(command, &config),
    }
}

fn run_dedupe(args: &DedupeArgs, config: Config, quiet: bool) -> Result<ExitCode> {
    let config = args.apply_to(config);
    let root = validate_root(&args.root)?;

    let index_path = config.index_path()?;
    let index = SqliteIndex::open(&index_path, config.durability)?;
    log::info!("Using fingerprint index {}", index_path.display());

    let handler = signal::install_handler()?;
    let progress = Arc::new(Progress::new(quiet));

    let mut walker = WalkerConfig::default()
        .with_traversal_workers(config.traversal_workers)
        .with_skip_hidden(config.skip_hidden)
        .with_min_size(config.min_size)
        .with_ignore_patterns(config.ignore_patterns.clone());
    for path in index_side_files(&absolute_index_path(&index_path)) {
        walker = walker.with_excluded_path(path);
    }

    let dedupe_config = DedupeConfig::default()
        .with_hash_workers(config.hash_workers)
        .with_resolve_workers(config.resolve_workers)
        .with_queue_capacity(config.queue_capacity)
        .with_link_strategy(config.link_strategy)
        .with_paranoid(config.paranoid)
        .with_dry_run(args.dry_run)
        .with_walker_config(walker)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);

    let summary = Deduplicator::new(Arc::new(index), dedupe_config).run(&root)?;

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => JsonReport::new(&summary).write_to(&mut stdout)?,
        OutputFormat::Text if !quiet => output::write_summary(&mut stdout, &summary)?,
        OutputFormat::Text => {}
    }

    for issue in summary.issues.iter().filter(|i| i.is_data_loss()) {
        log::error!("{}", issue);
    }

    Ok(summary.exit_code())
}

fn run_index(command: IndexCommand, config: &Config) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();

    match command {
        IndexCommand::Stats(location) => {
            let path = resolve_index_path(&location, config)?;
            if !path.exists() {
                writeln!(stdout, "Index {} does not exist yet", path.display())?;
                return Ok(ExitCode::Success);
            }
            let index = SqliteIndex::open(&path, config.durability)?;
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            writeln!(stdout, "Index:    {}", path.display())?;
            writeln!(stdout, "Entries:  {}", index.len()?)?;
            writeln!(stdout, "Size:     {}", bytesize::ByteSize::b(size))?;
        }
        IndexCommand::Lookup(args) => {
            let path = resolve_index_path(&args.location, config)?;
            let (fingerprint, _) = Hasher::new()
                .fingerprint(&args.file)
                .with_context(|| format!("Cannot fingerprint {}", args.file.display()))?;
            writeln!(stdout, "Fingerprint: {}", hash_to_hex(&fingerprint))?;
            if !path.exists() {
                writeln!(stdout, "Index {} does not exist yet", path.display())?;
                return Ok(ExitCode::Success);
            }

            let index = SqliteIndex::open(&path, config.durability)?;
            match index.get(&fingerprint)? {
                Some(canonical) => writeln!(stdout, "Canonical:   {}", canonical.display())?,
                None => writeln!(stdout, "Canonical:   (not indexed)")?,
            }
        }
        IndexCommand::Clear(args) => {
            let path = resolve_index_path(&args.location, config)?;
            let index = SqliteIndex::open(&path, config.durability)?;
            let removed = index.clear()?;
            writeln!(stdout, "Removed {} entries from {}", removed, path.display())?;
        }
    }

    Ok(ExitCode::Success)
}

fn resolve_index_path(location: &IndexLocation, config: &Config) -> Result<PathBuf> {
    match location.index {
        Some(ref path) => Ok(path.clone()),
        None => Ok(config.index_path()?),
    }
}

/// The index path as the walker will see it, so it can be excluded.
fn absolute_index_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
