//! Striped per-fingerprint locks.
//!
//! Resolver workers hold the stripe for a record's fingerprint across the
//! index lookup and any filesystem change that follows. Two records with the
//! same fingerprint therefore never resolve concurrently, while records with
//! different fingerprints usually land on different stripes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::scanner::Fingerprint;

/// Default number of stripes.
pub const DEFAULT_STRIPES: usize = 1024;

/// Fixed table of mutexes selected by fingerprint.
#[derive(Debug)]
pub struct FingerprintLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for FingerprintLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl FingerprintLocks {
    /// Create a table with `stripes` mutexes (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes.
    #[must_use]
    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }

    fn stripe_of(&self, fingerprint: &Fingerprint) -> usize {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&fingerprint[..8]);
        (u64::from_le_bytes(prefix) % self.stripes.len() as u64) as usize
    }

    /// Block until the stripe for `fingerprint` is held.
    ///
    /// A stripe poisoned by a panicking worker is recovered, since it guards
    /// no data of its own.
    pub fn lock(&self, fingerprint: &Fingerprint) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(fingerprint)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
