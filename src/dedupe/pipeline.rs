//! Pipeline orchestration: wires traversal, hashing and resolution together.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;

use super::hashing::{hash_worker, HashStats};
use super::resolver::{ResolveStats, Resolver};
use super::{DedupeError, FileRecord, FingerprintLocks, Issue, RunSummary};
use crate::actions::LinkStrategy;
use crate::index::FingerprintIndex;
use crate::progress::ProgressCallback;
use crate::scanner::{Hasher, Walker, WalkerConfig};

/// Configuration for a dedupe run.
#[derive(Clone)]
pub struct DedupeConfig {
    /// Number of hashing workers.
    pub hash_workers: usize,
    /// Number of resolver workers.
    pub resolve_workers: usize,
    /// Capacity of the path and record queues.
    pub queue_capacity: usize,
    /// How duplicates are replaced.
    pub link_strategy: LinkStrategy,
    /// Report duplicates without changing anything.
    pub dry_run: bool,
    /// Re-fingerprint the canonical before linking.
    pub paranoid: bool,
    /// Traversal settings.
    pub walker: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DedupeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupeConfig")
            .field("hash_workers", &self.hash_workers)
            .field("resolve_workers", &self.resolve_workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("link_strategy", &self.link_strategy)
            .field("dry_run", &self.dry_run)
            .field("paranoid", &self.paranoid)
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            hash_workers: 4,
            resolve_workers: 2,
            queue_capacity: 1024,
            link_strategy: LinkStrategy::default(),
            dry_run: false,
            paranoid: false,
            walker: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DedupeConfig {
    /// Set the number of hashing workers (at least one).
    #[must_use]
    pub fn with_hash_workers(mut self, workers: usize) -> Self {
        self.hash_workers = workers.max(1);
        self
    }

    /// Set the number of resolver workers (at least one).
    #[must_use]
    pub fn with_resolve_workers(mut self, workers: usize) -> Self {
        self.resolve_workers = workers.max(1);
        self
    }

    /// Set the number of traversal workers (at least one).
    #[must_use]
    pub fn with_traversal_workers(mut self, workers: usize) -> Self {
        self.walker = self.walker.with_traversal_workers(workers);
        self
    }

    /// Set the capacity of the path and record queues (at least one).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the link strategy.
    #[must_use]
    pub fn with_link_strategy(mut self, strategy: LinkStrategy) -> Self {
        self.link_strategy = strategy;
        self
    }

    /// Enable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable paranoid mode.
    #[must_use]
    pub fn with_paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    /// Replace the traversal settings, keeping the configured worker count.
    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    /// Never walk `path` (used for the index database and its side files).
    #[must_use]
    pub fn with_excluded_path(mut self, path: PathBuf) -> Self {
        self.walker = self.walker.with_excluded_path(path);
        self
    }

    /// Set the shutdown flag for graceful termination.
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
}

/// Runs the dedupe pipeline against a fingerprint index.
pub struct Deduplicator {
    index: Arc<dyn FingerprintIndex>,
    config: DedupeConfig,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Deduplicator {
    /// Create a deduplicator over `index`.
    #[must_use]
    pub fn new(index: Arc<dyn FingerprintIndex>, config: DedupeConfig) -> Self {
        Self { index, config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    /// Deduplicate every regular file under `root`.
    ///
    /// Blocks until all stages have finished. Per-file and per-directory
    /// failures are collected in [`RunSummary::issues`]; they never abort
    /// the run.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError::InvalidRoot`] if `root` does not exist or is
    /// not a directory. Nothing is traversed in that case.
    pub fn run(&self, root: &Path) -> Result<RunSummary, DedupeError> {
        let started = Instant::now();
        let root = validate_root(root)?;
        let config = &self.config;

        log::info!(
            "Deduplicating {} ({} hash workers, {} resolve workers, {} traversal workers{})",
            root.display(),
            config.hash_workers,
            config.resolve_workers,
            config.walker.traversal_workers,
            if config.dry_run { ", dry run" } else { "" }
        );

        let callback = config.progress_callback.as_deref();
        let shutdown = config.shutdown_flag.as_deref();
        if let Some(cb) = callback {
            cb.on_phase_start("dedupe");
        }

        let mut hasher = Hasher::new();
        let mut walker = Walker::new(&root, config.walker.clone());
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref cb) = config.progress_callback {
            walker = walker.with_progress_callback(Arc::clone(cb));
        }

        let locks = FingerprintLocks::default();
        let mut resolver = Resolver::new(self.index.as_ref(), &locks, &hasher)
            .with_strategy(config.link_strategy)
            .with_dry_run(config.dry_run)
            .with_paranoid(config.paranoid);
        if let Some(flag) = shutdown {
            resolver = resolver.with_shutdown_flag(flag);
        }
        if let Some(cb) = callback {
            resolver = resolver.with_progress_callback(cb);
        }

        let capacity = config.queue_capacity.max(1);
        let (path_tx, path_rx) = channel::bounded::<PathBuf>(capacity);
        let (record_tx, record_rx) = channel::bounded::<FileRecord>(capacity);

        let (walk_stats, hash_stats, resolve_stats) = thread::scope(|s| {
            let resolvers: Vec<_> = (0..config.resolve_workers.max(1))
                .map(|_| {
                    let records = record_rx.clone();
                    let resolver = &resolver;
                    s.spawn(move || resolver.run(&records))
                })
                .collect();

            let hashers: Vec<_> = (0..config.hash_workers.max(1))
                .map(|_| {
                    let paths = path_rx.clone();
                    let records = record_tx.clone();
                    let hasher = &hasher;
                    s.spawn(move || hash_worker(hasher, &paths, &records, shutdown, callback))
                })
                .collect();

            // Only the workers may hold channel ends now, so each stage's
            // queue closes as soon as its producers finish.
            drop(record_rx);
            drop(record_tx);
            drop(path_rx);

            let walk_stats = walker.walk(&path_tx);
            drop(path_tx);

            let mut hash_stats = HashStats::default();
            for handle in hashers {
                match handle.join() {
                    Ok(stats) => hash_stats.merge(stats),
                    Err(_) => log::error!("Hashing worker panicked"),
                }
            }

            let mut resolve_stats = ResolveStats::default();
            for handle in resolvers {
                match handle.join() {
                    Ok(stats) => resolve_stats.merge(stats),
                    Err(_) => log::error!("Resolver worker panicked"),
                }
            }

            (walk_stats, hash_stats, resolve_stats)
        });

        if let Some(cb) = callback {
            cb.on_phase_end("dedupe");
        }

        let interrupted = walk_stats.interrupted
            || hash_stats.interrupted
            || resolve_stats.interrupted
            || shutdown.is_some_and(|f| f.load(std::sync::atomic::Ordering::SeqCst));

        let mut issues: Vec<Issue> = Vec::with_capacity(
            walk_stats.errors.len() + hash_stats.errors.len() + resolve_stats.issues.len(),
        );
        issues.extend(walk_stats.errors.into_iter().map(Issue::Traversal));
        issues.extend(hash_stats.errors.into_iter().map(Issue::Hash));
        issues.extend(resolve_stats.issues);

        let summary = RunSummary {
            root,
            directories: walk_stats.directories,
            files_found: walk_stats.files,
            files_hashed: hash_stats.files_hashed,
            bytes_hashed: hash_stats.bytes_hashed,
            skipped_symlinks: walk_stats.skipped_symlinks,
            canonicals: resolve_stats.canonicals,
            already_canonical: resolve_stats.already_canonical,
            duplicates_linked: resolve_stats.duplicates_linked,
            bytes_reclaimed: resolve_stats.bytes_reclaimed,
            issues,
            interrupted,
            dry_run: config.dry_run,
            duration: started.elapsed(),
        };

        log::info!(
            "Run finished in {:.2?}: {} files, {} canonicals, {} linked, {} issues{}",
            summary.duration,
            summary.files_hashed,
            summary.canonicals,
            summary.duplicates_linked,
            summary.issues.len(),
            if summary.interrupted { " (interrupted)" } else { "" }
        );

        Ok(summary)
    }
}

/// Check that `root` is an existing directory and make it absolute.
///
/// # Errors
///
/// Returns [`DedupeError::InvalidRoot`] if `root` is missing, unreadable or
/// not a directory.
pub fn validate_root(root: &Path) -> Result<PathBuf, DedupeError> {
    let invalid = |reason: String| DedupeError::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    fs::canonicalize(root).map_err(|e| invalid(e.to_string()))
}

/// The index database plus the side files SQLite keeps next to it.
#[must_use]
pub fn index_side_files(index_path: &Path) -> Vec<PathBuf> {
    let mut files = vec![index_path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = index_path.as_os_str().to_os_string();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}
