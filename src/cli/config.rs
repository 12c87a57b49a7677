use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::query::JoinOptions;
use crate::storage::StoreOptions;

/// Settings read from a `join.toml` file.
///
/// ```toml
/// [join]
/// buffer_block = 1000
/// cache_overflow = "grow"
///
/// [store]
/// leaf_capacity = 256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Join engine options.
    pub join: JoinOptions,
    /// Index layout options.
    pub store: StoreOptions,
}

impl CliConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CliConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config
            .join
            .validate()
            .and_then(|()| config.store.validate())
            .map_err(|err| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        Ok(config)
    }
}

/// Failure to load a [`CliConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`CliConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// The values parse but cannot be used.
    #[error("invalid config {path}: {reason}")]
    Invalid {
        /// Offending file.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },
}
