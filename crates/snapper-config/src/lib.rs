//! # snapper-config
//!
//! Configuration management for Snapper.
//!
//! Loads configuration from:
//! 1. `~/.snapper/config.toml` (global)
//! 2. `.snapper/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)
//!
//! The loaded [`Config`] is a plain value. Callers construct the store from
//! it once and pass the store along; there is no process-wide instance.

pub mod logging;
pub mod path;
pub mod testing;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default data root, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "asset/data";
/// Default spool root, relative to the working directory.
pub const DEFAULT_SPOOL_DIR: &str = "asset/tmp";

pub const ENV_DATA_DIR: &str = "SNAPPER_DATA_DIR";
pub const ENV_SPOOL_DIR: &str = "SNAPPER_SPOOL_DIR";
pub const ENV_THREADS: &str = "SNAPPER_THREADS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub migrate: MigrateConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config = Self::load_from(global.as_deref(), &Self::project_config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load and layer the given files without consulting the environment.
    ///
    /// Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        if project.exists() {
            debug!("Loading project config from {:?}", project);
            let contents = std::fs::read_to_string(project)?;
            let overrides: ConfigOverrides = toml::from_str(&contents)?;
            config.merge(overrides);
        }

        config.expand_paths();
        Ok(config)
    }

    /// Global config path: ~/.snapper/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".snapper/config.toml"))
    }

    /// Project config path: .snapper/config.toml
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".snapper/config.toml")
    }

    /// Only keys present in the project file replace global values.
    fn merge(&mut self, other: ConfigOverrides) {
        if let Some(dir) = other.storage.data_dir {
            self.storage.data_dir = dir;
        }
        if let Some(dir) = other.storage.spool_dir {
            self.storage.spool_dir = dir;
        }
        if other.migrate.threads.is_some() {
            self.migrate.threads = other.migrate.threads;
        }
        if let Some(prune) = other.migrate.prune_legacy {
            self.migrate.prune_legacy = prune;
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    fn apply_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = path::expand_tilde(path);
        }
        if let Some(path) = lookup(ENV_SPOOL_DIR) {
            self.storage.spool_dir = path::expand_tilde(path);
        }
        if let Some(threads) = lookup(ENV_THREADS) {
            if let Ok(n) = threads.parse() {
                self.migrate.threads = Some(n);
            }
        }
    }

    fn expand_paths(&mut self) {
        self.storage.data_dir = path::expand_tilde(&self.storage.data_dir);
        self.storage.spool_dir = path::expand_tilde(&self.storage.spool_dir);
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Storage configuration
///
/// Both roots must live on the same filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Committed blobs
    pub data_dir: PathBuf,
    /// Staging area for in-flight writes
    pub spool_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            spool_dir: PathBuf::from(DEFAULT_SPOOL_DIR),
        }
    }
}

/// Legacy codec migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Number of parallel threads (None = auto)
    pub threads: Option<usize>,
    /// Remove legacy files once their rewrite validated
    pub prune_legacy: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverrides {
    storage: StorageOverrides,
    migrate: MigrateOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageOverrides {
    data_dir: Option<PathBuf>,
    spool_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MigrateOverrides {
    threads: Option<usize>,
    prune_legacy: Option<bool>,
}
