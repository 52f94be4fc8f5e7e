//! Loading [`InstrumentationConfig`] from disk.

use super::InstrumentationConfig;
use crate::error::{ConfigError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Namespace for configuration loading.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the configuration stored at `path`.
    ///
    /// - A missing file yields [`InstrumentationConfig::default`].
    /// - Other read failures become [`ConfigError::ReadError`].
    /// - Invalid TOML becomes [`ConfigError::ParseError`].
    /// - Out-of-range values become [`ConfigError::ValidationError`].
    pub fn load_from_path(path: &Path) -> Result<InstrumentationConfig> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No instrumentation config at {:?}, using defaults.",
                    path
                );
                return Ok(InstrumentationConfig::default());
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into());
            }
        };

        let config = InstrumentationConfig::from_toml_str(&content)?;
        debug!("Loaded instrumentation config from {:?}: {:?}", path, config);
        Ok(config)
    }
}
