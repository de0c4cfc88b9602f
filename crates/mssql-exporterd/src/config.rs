//! Exporter configuration file.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use mssql_exporter_core::MssqlConfig;

/// TOML configuration file contents.
///
/// ```toml
/// [database]
/// host = "db01.example.org"
/// port = 1433
/// username = "exporter"
/// password = "secret"
/// database = "master"
/// ```
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub database: MssqlConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&text).map_err(ConfigError::Parse)
}
