//! Dedup resolution: deciding, per record, canonical or duplicate.
//!
//! For each [`FileRecord`] the resolver, while holding the record's
//! fingerprint stripe:
//!
//! 1. asks the index for the fingerprint's canonical, registering the record
//!    if there is none (the record becomes the canonical, nothing on disk
//!    changes);
//! 2. does nothing if the record *is* the canonical;
//! 3. otherwise replaces the record's file with a symbolic link to the
//!    canonical.
//!
//! Failures affect only the record at hand.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;

use super::{FileRecord, FingerprintLocks, Issue};
use crate::actions::{check_link_preconditions, replace_with_symlink, verify_canonical, LinkStrategy};
use crate::index::FingerprintIndex;
use crate::progress::ProgressCallback;
use crate::scanner::Hasher;

/// What happened to one record.
#[derive(Debug)]
pub enum Outcome {
    /// First file seen with this content; now the canonical.
    Canonical,
    /// The file was already registered as its content's canonical.
    AlreadyCanonical,
    /// The file was replaced by a link (or would be, in a dry run).
    Linked,
    /// Something went wrong; the file is left as it was unless the issue is data loss.
    Failed(Issue),
}

/// Per-worker resolution statistics.
#[derive(Debug, Default)]
pub struct ResolveStats {
    /// Records that became canonicals
    pub canonicals: usize,
    /// Records that were already canonical
    pub already_canonical: usize,
    /// Duplicates linked
    pub duplicates_linked: usize,
    /// Bytes of duplicate content now stored once
    pub bytes_reclaimed: u64,
    /// Failures
    pub issues: Vec<Issue>,
    /// Whether the worker stopped early
    pub interrupted: bool,
}

impl ResolveStats {
    /// Fold another worker's statistics into this one.
    pub fn merge(&mut self, other: ResolveStats) {
        self.canonicals += other.canonicals;
        self.already_canonical += other.already_canonical;
        self.duplicates_linked += other.duplicates_linked;
        self.bytes_reclaimed += other.bytes_reclaimed;
        self.issues.extend(other.issues);
        self.interrupted |= other.interrupted;
    }

    fn record(&mut self, record: &FileRecord, outcome: Outcome) {
        match outcome {
            Outcome::Canonical => self.canonicals += 1,
            Outcome::AlreadyCanonical => self.already_canonical += 1,
            Outcome::Linked => {
                self.duplicates_linked += 1;
                self.bytes_reclaimed += record.size;
            }
            Outcome::Failed(issue) => self.issues.push(issue),
        }
    }
}

/// Shared state for resolver workers.
pub struct Resolver<'a> {
    index: &'a dyn FingerprintIndex,
    locks: &'a FingerprintLocks,
    hasher: &'a Hasher,
    strategy: LinkStrategy,
    dry_run: bool,
    paranoid: bool,
    shutdown_flag: Option<&'a AtomicBool>,
    progress_callback: Option<&'a dyn ProgressCallback>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `index`, serialized by `locks`.
    #[must_use]
    pub fn new(
        index: &'a dyn FingerprintIndex,
        locks: &'a FingerprintLocks,
        hasher: &'a Hasher,
    ) -> Self {
        Self {
            index,
            locks,
            hasher,
            strategy: LinkStrategy::default(),
            dry_run: false,
            paranoid: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the link strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: LinkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Report duplicates without touching the filesystem.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Re-fingerprint the canonical before every link.
    #[must_use]
    pub fn with_paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: &'a dyn ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Resolve a single record.
    pub fn resolve(&self, record: &FileRecord) -> Outcome {
        let _stripe = self.locks.lock(&record.fingerprint);

        let lookup = match self.index.lookup_or_insert(&record.fingerprint, &record.path) {
            Ok(lookup) => lookup,
            Err(source) => {
                log::warn!("Index lookup failed for {}: {}", record.path.display(), source);
                return self.fail(Issue::Store {
                    path: record.path.clone(),
                    source,
                });
            }
        };

        if lookup.inserted {
            log::trace!("Canonical: {}", record.path.display());
            if let Some(cb) = self.progress_callback {
                cb.on_canonical(&record.path);
            }
            return Outcome::Canonical;
        }

        let canonical = lookup.existing;
        if canonical == record.path {
            log::trace!("Already canonical: {}", record.path.display());
            return Outcome::AlreadyCanonical;
        }

        if self.paranoid {
            if let Err(e) = verify_canonical(self.hasher, &record.path, &canonical, &record.fingerprint)
            {
                log::warn!("Not linking {}: {}", record.path.display(), e);
                return self.fail(Issue::Link(e));
            }
        }

        let result = if self.dry_run {
            check_link_preconditions(&record.path, &canonical)
        } else {
            replace_with_symlink(&record.path, &canonical, self.strategy)
        };

        match result {
            Ok(()) => {
                if self.dry_run {
                    log::info!(
                        "Would link {} -> {}",
                        record.path.display(),
                        canonical.display()
                    );
                } else {
                    log::info!("Linked {} -> {}", record.path.display(), canonical.display());
                }
                if let Some(cb) = self.progress_callback {
                    cb.on_duplicate(&record.path, &canonical, record.size);
                }
                Outcome::Linked
            }
            Err(e) if e.is_data_loss() => {
                log::error!("{}", e);
                self.fail(Issue::Link(e))
            }
            Err(e) => {
                log::warn!("Not linking {}: {}", record.path.display(), e);
                self.fail(Issue::Link(e))
            }
        }
    }

    fn fail(&self, issue: Issue) -> Outcome {
        if let Some(cb) = self.progress_callback {
            cb.on_error(issue.path(), &issue.to_string());
        }
        Outcome::Failed(issue)
    }

    /// Run one resolver worker until `records` is closed or shutdown is requested.
    pub fn run(&self, records: &Receiver<FileRecord>) -> ResolveStats {
        let mut stats = ResolveStats::default();

        for record in records.iter() {
            if self.is_shutdown_requested() {
                stats.interrupted = true;
                break;
            }
            let outcome = self.resolve(&record);
            stats.record(&record, outcome);
        }

        stats
    }
}
