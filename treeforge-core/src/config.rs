//! Host configuration loaded from `<home>/.treeforge/config.yaml`.
//!
//! A missing file yields [`HostConfig::default`]; any field omitted from the
//! file takes its default value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ManifestError};
use crate::manifest::root_at;

/// Settings for talking to the remote hosting account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// REST API root, without a trailing slash.
    pub api_url: String,
    /// Account that owns the reconciled repositories.
    pub owner: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Delay inserted before every write-class call.
    pub pacing_ms: u64,
    /// Upper bound for a single remote call.
    pub timeout_secs: u64,
    /// Retries for transient transport faults, per call.
    pub max_retries: u32,
    /// First retry delay; doubled for each further attempt.
    pub retry_backoff_ms: u64,
    /// Candidate base branches, in fallback order.
    pub base_branches: Vec<String>,
    /// Visibility of repositories created by a run.
    pub private: bool,
    /// Create repositories with an initial commit so a base branch exists.
    pub auto_init: bool,
    /// Write into each repository's default branch instead of the branch
    /// declared on its record.
    pub use_default_branch: bool,
    /// Root of the local device-tree directories.
    pub trees_dir: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            token_env: "GITHUB_TOKEN".to_string(),
            pacing_ms: 300,
            timeout_secs: 30,
            max_retries: 1,
            retry_backoff_ms: 500,
            base_branches: vec!["main".to_string(), "master".to_string()],
            private: false,
            auto_init: true,
            use_default_branch: false,
            trees_dir: PathBuf::from("device-trees"),
        }
    }
}

impl HostConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// `<home>/.treeforge/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// Load the host configuration, falling back to defaults when absent.
pub fn load_at(home: &Path) -> Result<HostConfig, ManifestError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(HostConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(HostConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse { path, source: e })
}
