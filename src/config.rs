//! Process-wide configuration resolved from the environment.
//!
//! All dataset-dependent operations hang off a single data root directory,
//! pointed at by the `MYCOID_HOME` environment variable. The root is resolved
//! once at startup into a [`Config`] that is passed by reference to the rest
//! of the application; nothing re-reads the environment after that.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable naming the data root directory.
pub const DATA_ROOT_ENV: &str = "MYCOID_HOME";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set; point it at the mycoid data directory")]
    MissingEnv(&'static str),

    #[error("data root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),
}

/// Resolved application paths, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    data_root: PathBuf,
}

impl Config {
    /// Resolve the configuration from `MYCOID_HOME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var(DATA_ROOT_ENV)
    }

    fn from_env_var(var: &'static str) -> Result<Self, ConfigError> {
        let root = std::env::var_os(var).ok_or(ConfigError::MissingEnv(var))?;
        Self::from_root(PathBuf::from(root))
    }

    /// Build a configuration from an explicit root directory.
    pub fn from_root(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root));
        }
        Ok(Config { data_root: root })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Directory holding the dnabarcoder reference datasets.
    pub fn dnabarcoder_dir(&self) -> PathBuf {
        self.data_root.join("dnabarcoder")
    }

    /// Directory for a single reference dataset, e.g. `<root>/dnabarcoder/UNITE2024ITS1`.
    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.dnabarcoder_dir().join(name)
    }

    /// Directory holding the taxotagger vector databases.
    pub fn taxotagger_dir(&self) -> PathBuf {
        self.data_root.join("taxotagger")
    }
}
