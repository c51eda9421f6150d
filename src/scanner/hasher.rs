//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing content
//! fingerprints. Files are streamed through a fixed [`BUFFER_SIZE`] buffer,
//! so memory use does not depend on file size.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let (fingerprint, bytes) = hasher.fingerprint(Path::new("photo.jpg")).unwrap();
//! println!("{} ({} bytes)", hash_to_hex(&fingerprint), bytes);
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// Size of the read buffer used while streaming file contents (64 KiB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// A 256-bit BLAKE3 content fingerprint.
pub type Fingerprint = [u8; 32];

/// Streaming content hasher.
///
/// The hasher holds no per-file state and can be shared across worker
/// threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown flag checked between chunks.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint the full content of the file at `path`.
    ///
    /// Returns the digest and the number of bytes read.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened, a read fails
    /// mid-stream, or shutdown is requested while hashing.
    pub fn fingerprint(&self, path: &Path) -> Result<(Fingerprint, u64), HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.fingerprint_reader(path, &mut file)
    }

    /// Fingerprint everything `reader` yields. `path` is only used for errors.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] on read failure or shutdown.
    pub fn fingerprint_reader<R: Read>(
        &self,
        path: &Path,
        reader: &mut R,
    ) -> Result<(Fingerprint, u64), HashError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total: u64 = 0;

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }

            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
        }

        Ok((*hasher.finalize().as_bytes(), total))
    }
}

/// Render a fingerprint as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Fingerprint) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a 64-character hex string back into a fingerprint.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Fingerprint> {
    let hex = hex.trim();
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }

    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
