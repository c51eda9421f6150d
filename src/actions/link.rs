//! Replacing duplicate files with symbolic links.
//!
//! # Overview
//!
//! [`replace_with_symlink`] turns a duplicate into a symbolic link pointing at
//! the canonical copy's absolute path. Two strategies are available:
//!
//! - [`LinkStrategy::Rename`] (default): the link is created under a temporary
//!   sibling name and renamed over the duplicate. On one filesystem the rename
//!   is atomic, so the duplicate's path always resolves to the content.
//! - [`LinkStrategy::DeleteThenLink`]: the duplicate is removed first and the
//!   link created afterwards. If the second step fails the content at that
//!   path is gone and [`LinkError::PartialDuplicate`] is returned.
//!
//! # Safety
//!
//! Both the duplicate and the canonical are re-checked immediately before any
//! mutation: the duplicate must still be a regular file and the canonical
//! must still exist as a regular file.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::actions::{replace_with_symlink, LinkStrategy};
//! use std::path::Path;
//!
//! replace_with_symlink(
//!     Path::new("/data/b/copy.jpg"),
//!     Path::new("/data/a/photo.jpg"),
//!     LinkStrategy::Rename,
//! )
//! .unwrap();
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::{Fingerprint, HashError, Hasher};

/// How a duplicate is swapped for a link.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStrategy {
    /// Create the link beside the duplicate, then rename it into place.
    #[default]
    Rename,
    /// Delete the duplicate, then create the link at its path.
    DeleteThenLink,
}

impl std::fmt::Display for LinkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rename => write!(f, "rename"),
            Self::DeleteThenLink => write!(f, "delete-then-link"),
        }
    }
}

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The duplicate disappeared before it could be replaced.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The duplicate is no longer a regular file (already a link, or replaced by a directory).
    #[error("not a regular file: {0}")]
    NotARegularFile(PathBuf),

    /// The duplicate and canonical are the same path.
    #[error("refusing to link {0} to itself")]
    SamePath(PathBuf),

    /// The canonical copy no longer exists as a regular file.
    #[error("canonical copy {canonical} for {duplicate} is missing")]
    CanonicalMissing {
        /// File that would have been replaced
        duplicate: PathBuf,
        /// Recorded canonical path
        canonical: PathBuf,
    },

    /// The canonical copy's content no longer matches its recorded fingerprint.
    #[error("canonical copy {0} has changed since it was indexed")]
    CanonicalChanged(PathBuf),

    /// Permission denied while replacing the duplicate.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The duplicate was deleted but the link could not be created.
    #[error("DATA LOSS: {duplicate} was deleted but linking it to {canonical} failed: {source}")]
    PartialDuplicate {
        /// Path that no longer exists
        duplicate: PathBuf,
        /// Intended link target
        canonical: PathBuf,
        /// Why link creation failed
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure. The duplicate is left untouched.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Whether the failure left a path without its content.
    #[must_use]
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Self::PartialDuplicate { .. })
    }

    /// Path of the duplicate (or canonical) the error concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::NotARegularFile(p)
            | Self::SamePath(p)
            | Self::CanonicalChanged(p)
            | Self::PermissionDenied(p)
            | Self::Io { path: p, .. } => p,
            Self::CanonicalMissing { duplicate, .. } | Self::PartialDuplicate { duplicate, .. } => {
                duplicate
            }
        }
    }

    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replace `duplicate` with a symbolic link to `canonical`.
///
/// `canonical` should be absolute; it is stored verbatim as the link target.
///
/// # Errors
///
/// - `NotFound` / `NotARegularFile` if the duplicate changed since it was hashed
/// - `CanonicalMissing` if the canonical is gone (the duplicate is untouched)
/// - `PartialDuplicate` if [`LinkStrategy::DeleteThenLink`] deleted the file
///   but could not create the link
/// - `Io` / `PermissionDenied` for other failures (the duplicate is untouched)
pub fn replace_with_symlink(
    duplicate: &Path,
    canonical: &Path,
    strategy: LinkStrategy,
) -> Result<(), LinkError> {
    check_link_preconditions(duplicate, canonical)?;

    match strategy {
        LinkStrategy::Rename => link_by_rename(duplicate, canonical),
        LinkStrategy::DeleteThenLink => link_by_delete(duplicate, canonical),
    }?;

    log::debug!(
        "Linked {} -> {}",
        duplicate.display(),
        canonical.display()
    );
    Ok(())
}

/// Verify that both ends of a prospective link are still regular files.
///
/// # Errors
///
/// See [`replace_with_symlink`].
pub fn check_link_preconditions(duplicate: &Path, canonical: &Path) -> Result<(), LinkError> {
    if duplicate == canonical {
        return Err(LinkError::SamePath(duplicate.to_path_buf()));
    }

    let meta = fs::symlink_metadata(duplicate).map_err(|e| LinkError::from_io(duplicate, e))?;
    if !meta.file_type().is_file() {
        return Err(LinkError::NotARegularFile(duplicate.to_path_buf()));
    }

    match fs::symlink_metadata(canonical) {
        Ok(meta) if meta.file_type().is_file() => Ok(()),
        Ok(_) | Err(_) => Err(LinkError::CanonicalMissing {
            duplicate: duplicate.to_path_buf(),
            canonical: canonical.to_path_buf(),
        }),
    }
}

/// Re-fingerprint `canonical` and compare against `expected`.
///
/// # Errors
///
/// Returns `CanonicalChanged` on mismatch, `CanonicalMissing` if the file is
/// gone, or `Io` if it cannot be read.
pub fn verify_canonical(
    hasher: &Hasher,
    duplicate: &Path,
    canonical: &Path,
    expected: &Fingerprint,
) -> Result<(), LinkError> {
    match hasher.fingerprint(canonical) {
        Ok((actual, _)) if &actual == expected => Ok(()),
        Ok(_) => {
            log::warn!(
                "Canonical {} no longer matches its fingerprint",
                canonical.display()
            );
            Err(LinkError::CanonicalChanged(canonical.to_path_buf()))
        }
        Err(HashError::NotFound(_)) => Err(LinkError::CanonicalMissing {
            duplicate: duplicate.to_path_buf(),
            canonical: canonical.to_path_buf(),
        }),
        Err(HashError::Io { path, source }) => Err(LinkError::Io { path, source }),
        Err(e) => Err(LinkError::Io {
            path: canonical.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
        }),
    }
}

fn link_by_rename(duplicate: &Path, canonical: &Path) -> Result<(), LinkError> {
    let temp = temp_sibling(duplicate);

    create_symlink(canonical, &temp).map_err(|e| LinkError::from_io(&temp, e))?;

    if let Err(e) = fs::rename(&temp, duplicate) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            log::warn!(
                "Failed to remove temporary link {}: {}",
                temp.display(),
                cleanup
            );
        }
        return Err(LinkError::from_io(duplicate, e));
    }
    Ok(())
}

fn link_by_delete(duplicate: &Path, canonical: &Path) -> Result<(), LinkError> {
    delete_then_link_with(duplicate, canonical, create_symlink)
}

fn delete_then_link_with<F>(duplicate: &Path, canonical: &Path, link: F) -> Result<(), LinkError>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    fs::remove_file(duplicate).map_err(|e| LinkError::from_io(duplicate, e))?;

    link(canonical, duplicate).map_err(|source| LinkError::PartialDuplicate {
        duplicate: duplicate.to_path_buf(),
        canonical: canonical.to_path_buf(),
        source,
    })
}

/// Hidden name in the duplicate's directory, unique within this process.
///
/// The name has a fixed length so it stays within `NAME_MAX` however long
/// the duplicate's own name is.
fn temp_sibling(duplicate: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    duplicate.with_file_name(format!(".dupelink-{}-{n}.tmp", std::process::id()))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
