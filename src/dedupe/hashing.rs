//! Hashing stage: paths in, [`FileRecord`]s out.
//!
//! Each worker pulls the next path from the shared queue, fingerprints it and
//! forwards the record. A failure is logged, counted, and the path dropped;
//! there are no retries.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

use super::FileRecord;
use crate::progress::ProgressCallback;
use crate::scanner::{HashError, Hasher};

/// Per-worker hashing statistics.
#[derive(Debug, Default)]
pub struct HashStats {
    /// Files successfully fingerprinted
    pub files_hashed: usize,
    /// Bytes read while fingerprinting
    pub bytes_hashed: u64,
    /// Files that could not be fingerprinted
    pub errors: Vec<HashError>,
    /// Whether the worker stopped early
    pub interrupted: bool,
}

impl HashStats {
    /// Fold another worker's statistics into this one.
    pub fn merge(&mut self, other: HashStats) {
        self.files_hashed += other.files_hashed;
        self.bytes_hashed += other.bytes_hashed;
        self.errors.extend(other.errors);
        self.interrupted |= other.interrupted;
    }
}

/// Run one hashing worker until `paths` is closed or shutdown is requested.
///
/// Returns when the path queue is exhausted, when `records` has no receivers
/// left, or when `shutdown` is set.
pub fn hash_worker(
    hasher: &Hasher,
    paths: &Receiver<PathBuf>,
    records: &Sender<FileRecord>,
    shutdown: Option<&AtomicBool>,
    callback: Option<&dyn ProgressCallback>,
) -> HashStats {
    let mut stats = HashStats::default();

    for path in paths.iter() {
        if shutdown.is_some_and(|f| f.load(Ordering::SeqCst)) {
            stats.interrupted = true;
            break;
        }

        match hasher.fingerprint(&path) {
            Ok((fingerprint, size)) => {
                stats.files_hashed += 1;
                stats.bytes_hashed += size;
                if let Some(cb) = callback {
                    cb.on_file_hashed(&path, size);
                }
                log::trace!("Hashed {} ({} bytes)", path.display(), size);

                let record = FileRecord {
                    path,
                    fingerprint,
                    size,
                };
                if records.send(record).is_err() {
                    log::debug!("Hashing: record consumers gone, stopping");
                    stats.interrupted = true;
                    break;
                }
            }
            Err(HashError::Interrupted(_)) => {
                stats.interrupted = true;
                break;
            }
            Err(e) => {
                log::warn!("Skipping file: {}", e);
                if let Some(cb) = callback {
                    cb.on_error(&path, &e.to_string());
                }
                stats.errors.push(e);
            }
        }
    }

    stats
}
