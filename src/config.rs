//! Application configuration management.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config FILE`, or `config.toml` in the platform config
//!    directory if it exists
//! 3. `DUPELINK_*` environment variables (`__` separates nested keys)
//! 4. Command-line flags, applied by the caller
//!
//! # Example file
//!
//! ```toml
//! index_path = "/var/lib/dupelink/fingerprints.db"
//! hash_workers = 8
//! durability = "normal"
//! link_strategy = "rename"
//! ignore_patterns = ["*.tmp", ".git/"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::LinkStrategy;
use crate::index::Durability;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DUPELINK_";

/// File name of the index inside the platform data directory.
pub const DEFAULT_INDEX_FILE: &str = "fingerprints.db";

/// Errors while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong types.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// No index path was configured and no platform data directory exists.
    #[error("Cannot determine a default index location; pass --index")]
    NoIndexPath,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location of the fingerprint index database.
    pub index_path: Option<PathBuf>,
    /// Number of hashing workers.
    pub hash_workers: usize,
    /// Number of resolver workers.
    pub resolve_workers: usize,
    /// Number of traversal workers.
    pub traversal_workers: usize,
    /// Capacity of the path and record queues.
    pub queue_capacity: usize,
    /// Index durability.
    pub durability: Durability,
    /// How duplicates are replaced.
    pub link_strategy: LinkStrategy,
    /// Re-fingerprint canonicals before linking.
    pub paranoid: bool,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Ignore files smaller than this many bytes.
    pub min_size: Option<u64>,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: None,
            hash_workers: 4,
            resolve_workers: 2,
            traversal_workers: 4,
            queue_capacity: 1024,
            durability: Durability::Full,
            link_strategy: LinkStrategy::Rename,
            paranoid: false,
            skip_hidden: false,
            min_size: None,
            ignore_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Build the figment for defaults, the config file, and the environment.
    ///
    /// A missing default config file is silently skipped.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path)
        {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from all layers below the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `config_file` was given but does
    /// not exist, or [`ConfigError::Invalid`] if any layer fails to parse.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }

        let config: Config = Self::figment(config_file).extract().map_err(Box::new)?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config.normalized())
    }

    /// Clamp worker counts and queue capacity to at least one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.hash_workers = self.hash_workers.max(1);
        self.resolve_workers = self.resolve_workers.max(1);
        self.traversal_workers = self.traversal_workers.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    /// The configured index path, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoIndexPath`] if neither is available.
    pub fn index_path(&self) -> Result<PathBuf, ConfigError> {
        self.index_path
            .clone()
            .or_else(Self::default_index_path)
            .ok_or(ConfigError::NoIndexPath)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "dupelink", "dupelink")
    }

    /// `config.toml` in the platform config directory.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// `fingerprints.db` in the platform data directory.
    #[must_use]
    pub fn default_index_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join(DEFAULT_INDEX_FILE))
    }
}
