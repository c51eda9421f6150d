//! SQLite-backed fingerprint index.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE fingerprints (
//!     fingerprint    BLOB PRIMARY KEY NOT NULL,  -- 32-byte BLAKE3 digest
//!     canonical_path BLOB NOT NULL               -- raw OS path bytes
//! ) WITHOUT ROWID;
//! ```
//!
//! The schema version lives in `PRAGMA user_version`.
//!
//! # Concurrency
//!
//! The index holds a small, fixed set of connections, each behind its own
//! mutex. A fingerprint always maps to the same connection, so callers racing
//! on one fingerprint are serialized while unrelated fingerprints use other
//! connections. Within a shard, insert-if-absent is a single
//! `INSERT ... ON CONFLICT DO NOTHING` statement guarded by the primary key.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{Durability, FingerprintIndex, Lookup, StoreError};
use crate::scanner::Fingerprint;

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Number of connections opened by [`SqliteIndex::open`].
pub const DEFAULT_SHARDS: usize = 8;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS fingerprints (
    fingerprint BLOB PRIMARY KEY NOT NULL,
    canonical_path BLOB NOT NULL
) WITHOUT ROWID;
";

/// Persistent fingerprint index stored in a single SQLite file.
pub struct SqliteIndex {
    path: PathBuf,
    durability: Durability,
    shards: Vec<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("path", &self.path)
            .field("durability", &self.durability)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl SqliteIndex {
    /// Open (or create) the index at `path` with [`DEFAULT_SHARDS`] connections.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be opened or
    /// initialized, and [`StoreError::UnsupportedSchema`] if it was written by
    /// a newer version.
    pub fn open(path: &Path, durability: Durability) -> Result<Self, StoreError> {
        Self::open_with_shards(path, durability, DEFAULT_SHARDS)
    }

    /// Open the index with an explicit number of connections (at least one).
    ///
    /// # Errors
    ///
    /// See [`SqliteIndex::open`].
    pub fn open_with_shards(
        path: &Path,
        durability: Durability,
        shards: usize,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        let first = Connection::open(path).map_err(open_err)?;
        first
            .execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(open_err)?;
        configure_connection(&first, durability).map_err(open_err)?;
        migrate_schema(&first, path)?;

        let mut connections = vec![Mutex::new(first)];
        for _ in 1..shards.max(1) {
            let conn = Connection::open(path).map_err(open_err)?;
            configure_connection(&conn, durability).map_err(open_err)?;
            connections.push(Mutex::new(conn));
        }

        log::debug!(
            "Opened fingerprint index {} ({} connections, durability {})",
            path.display(),
            connections.len(),
            durability
        );

        Ok(Self {
            path: path.to_path_buf(),
            durability,
            shards: connections,
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured durability.
    #[must_use]
    pub fn durability(&self) -> Durability {
        self.durability
    }

    fn shard(&self, fingerprint: &Fingerprint) -> Result<MutexGuard<'_, Connection>, StoreError> {
        let index = usize::from(fingerprint[0]) % self.shards.len();
        self.shards[index].lock().map_err(|_| StoreError::Lock)
    }

    fn any_shard(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.shards[0].lock().map_err(|_| StoreError::Lock)
    }

    /// Canonical path recorded for `fingerprint`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<PathBuf>, StoreError> {
        let conn = self.shard(fingerprint)?;
        select_canonical(&conn, fingerprint)
    }

    /// Number of fingerprints recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn len(&self) -> Result<u64, StoreError> {
        let conn = self.any_shard()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Whether the index has no entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Delete every entry. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.any_shard()?;
        let removed = conn.execute("DELETE FROM fingerprints", [])?;
        log::info!("Cleared {} entries from {}", removed, self.path.display());
        Ok(removed)
    }
}

impl FingerprintIndex for SqliteIndex {
    fn lookup_or_insert(&self, fingerprint: &Fingerprint, path: &Path) -> Result<Lookup, StoreError> {
        let conn = self.shard(fingerprint)?;

        let inserted = conn
            .prepare_cached(
                "INSERT INTO fingerprints (fingerprint, canonical_path) VALUES (?1, ?2)
                 ON CONFLICT (fingerprint) DO NOTHING",
            )?
            .execute(params![&fingerprint[..], path_to_bytes(path)])?
            == 1;

        if inserted {
            return Ok(Lookup {
                existing: path.to_path_buf(),
                inserted: true,
            });
        }

        // The row exists: the conflict above guarantees it, and rows are never
        // deleted while a shard lock is held.
        match select_canonical(&conn, fingerprint)? {
            Some(existing) => Ok(Lookup {
                existing,
                inserted: false,
            }),
            None => Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    }
}

fn configure_connection(conn: &Connection, durability: Durability) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "synchronous", durability.synchronous_pragma())?;
    Ok(())
}

fn migrate_schema(conn: &Connection, path: &Path) -> Result<(), StoreError> {
    let open_err = |source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    };

    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(open_err)?;

    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(CREATE_TABLE).map_err(open_err)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(open_err)?;
        log::debug!("Initialized index schema version {}", SCHEMA_VERSION);
    }
    Ok(())
}

fn select_canonical(
    conn: &Connection,
    fingerprint: &Fingerprint,
) -> Result<Option<PathBuf>, StoreError> {
    let bytes: Option<Vec<u8>> = conn
        .prepare_cached("SELECT canonical_path FROM fingerprints WHERE fingerprint = ?1")?
        .query_row(params![&fingerprint[..]], |row| row.get(0))
        .optional()?;
    Ok(bytes.map(path_from_bytes))
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}
