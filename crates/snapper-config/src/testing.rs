//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - Temporary data and spool roots on one filesystem
//! - A project directory for project-local config files
//! - Environment variables for spawning the CLI against those roots
//!
//! # Usage
//!
//! ```ignore
//! use snapper_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     // env.data_dir, env.spool_dir, env.project_root are all isolated
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::{Config, ENV_DATA_DIR, ENV_SPOOL_DIR};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Committed blob root
    pub data_dir: PathBuf,
    /// Staging root, sibling of `data_dir`
    pub spool_dir: PathBuf,
    /// Working directory for project-local config
    pub project_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let data_dir = root.join("asset").join("data");
        let spool_dir = root.join("asset").join("tmp");
        let project_root = root.join("project");

        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(&spool_dir)?;
        std::fs::create_dir_all(&project_root)?;

        Ok(Self {
            _temp_dir: temp_dir,
            data_dir,
            spool_dir,
            project_root,
            test_id,
        })
    }

    /// Config pointing at this environment's roots
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.storage.data_dir = self.data_dir.clone();
        cfg.storage.spool_dir = self.spool_dir.clone();
        cfg
    }

    /// Write `.snapper/config.toml` under the project root
    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let dir = self.project_root.join(".snapper");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.toml");
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create a test file with content under the project root
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Files currently sitting in the spool (should be zero between writes)
    pub fn spool_file_count(&self) -> usize {
        WalkDir::new(&self.spool_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }

    /// Environment variables for spawning the CLI against this environment.
    pub fn cli_env(&self) -> Vec<(String, String)> {
        vec![
            (
                ENV_DATA_DIR.to_string(),
                self.data_dir.to_string_lossy().into_owned(),
            ),
            (
                ENV_SPOOL_DIR.to_string(),
                self.spool_dir.to_string_lossy().into_owned(),
            ),
            ("HOME".to_string(), self.project_root.to_string_lossy().into_owned()),
        ]
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.data_dir.is_dir());
        assert!(env.spool_dir.is_dir());
        assert!(env.project_root.is_dir());
        assert_eq!(env.spool_file_count(), 0);
    }

    #[test]
    fn test_environment_is_unique() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.data_dir, env2.data_dir);
        assert_ne!(env1.test_id, env2.test_id);
    }

    #[test]
    fn test_config_points_at_roots() {
        let env = TestEnvironment::new().unwrap();
        let cfg = env.config();
        assert_eq!(cfg.storage.data_dir, env.data_dir);
        assert_eq!(cfg.storage.spool_dir, env.spool_dir);
    }

    #[test]
    fn test_cli_env() {
        let env = TestEnvironment::new().unwrap();
        let vars = env.cli_env();
        assert!(vars.iter().any(|(k, _)| k == ENV_DATA_DIR));
        assert!(vars.iter().any(|(k, _)| k == ENV_SPOOL_DIR));
    }
}
