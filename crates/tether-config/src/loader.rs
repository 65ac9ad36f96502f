//! Loading configuration from TOML.

use crate::config::TetherConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for the schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Loads and validates [`TetherConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a TOML configuration file.
    pub async fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<TetherConfig> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_toml_str(&text)?;
        info!(
            "Loaded config from {} (backend: {})",
            path.display(),
            config.watch.backend.as_str()
        );
        Ok(config)
    }

    /// Parse and validate configuration held in memory.
    pub fn from_toml_str(text: &str) -> ConfigResult<TetherConfig> {
        let config: TetherConfig = toml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}
