//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the first CLI argument (must exist)
//! 2. Default location (optional, defaults apply when absent):
//!    - **Linux/macOS:** `~/.finance-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.finance-mcp\config.json`
//!
//! Environment variables (`TUSHARE_TOKEN`, `TUSHARE_API_URL`, `PORT`) are
//! applied on top of the file.
//!
//! # Example Configuration
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{
    Config, HttpConfig, LoggingConfig, SessionConfig, TushareConfig, DEFAULT_API_URL,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.finance-mcp/`
/// - **Windows:** `%USERPROFILE%\.finance-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".finance-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration, applies environment overrides and validates it.
///
/// If `path` is `None`, the platform-specific default location is tried and
/// built-in defaults are used when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly named configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => read_config_file(&p)?,
            _ => Config::default(),
        },
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}

/// Reads and parses a configuration file without applying overrides.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or malformed.
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}
