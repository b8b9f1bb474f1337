//! Configuration discovery and loading
//!
//! Lookup order:
//! 1. Explicit `--config` path
//! 2. Current directory: ./dockhand.toml or ./.dockhand/config.toml
//! 3. User config: ~/.dockhand/config.toml
//! 4. System config: /etc/dockhand/config.toml
//! 5. Built-in defaults

use crate::docker::{OrchestratorConfig, SearchPath};
use crate::env;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// System-wide configuration file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/dockhand/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    /// Initial search path of every orchestrator
    pub search_path: Vec<String>,
    /// Gateway timeout per call, 0 disables it
    pub timeout_secs: u64,
    /// Shell used by the local gateway
    pub shell: String,
    pub docker_binary: String,
}

impl Default for DockhandConfig {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
            timeout_secs: env::DEFAULT_TIMEOUT_SECS,
            shell: env::DEFAULT_SHELL.to_string(),
            docker_binary: env::DEFAULT_DOCKER_BINARY.to_string(),
        }
    }
}

impl DockhandConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` when given, otherwise walk the discovery hierarchy.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            info!("Loading configuration override from: {:?}", path);
            return Self::from_toml_file(path);
        }
        match Self::find_config_file() {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                Self::from_toml_file(path)
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// First existing file of the discovery hierarchy.
    pub fn find_config_file() -> Option<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = home_dir();
        Self::config_candidates(current_dir.as_deref(), home_dir.as_deref())
            .into_iter()
            .find(|candidate| {
                debug!("Checking for config file: {:?}", candidate);
                candidate.is_file()
            })
    }

    /// Configuration file candidates in priority order.
    pub fn config_candidates(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(current_dir) = current_dir {
            candidates.extend(env::local_config_file_paths(current_dir));
        }
        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }
        #[cfg(unix)]
        candidates.push(PathBuf::from(SYSTEM_CONFIG_FILE));
        candidates
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            docker_binary: self.docker_binary.clone(),
            search_path: SearchPath::new(self.search_path.iter().cloned()),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std_env::var("HOME")
        .ok()
        .or_else(|| std_env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}
