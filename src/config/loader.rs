//! Configuration loading and discovery for `avatars.toml`
//!
//! Provides functions to find, load, and merge configuration, plus the
//! small credential and year files that sit next to it.

use super::schema::SheetConfig;
use chrono::Datelike;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Name of the configuration file searched for.
pub const CONFIG_FILE_NAME: &str = "avatars.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse avatars.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// API key file missing or unreadable
    #[error("Failed to read API key file '{}': {source}", path.display())]
    ApiKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Year file doesn't hold a year
    #[error("Year file '{}' does not contain a year: '{value}'", path.display())]
    Year { path: PathBuf, value: String },
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override season year
    pub year: Option<i32>,
    /// Override API key file
    pub key_file: Option<PathBuf>,
    /// Override year file
    pub year_file: Option<PathBuf>,
    /// Override API root
    pub api_url: Option<String>,
    /// Override output directory
    pub out_dir: Option<PathBuf>,
}

/// Find avatars.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find avatars.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an avatars.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the
/// default configuration.
pub fn load_config(path: Option<&Path>) -> Result<SheetConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(SheetConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<SheetConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SheetConfig = toml::from_str(&contents)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &SheetConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}

/// Merge CLI overrides into a configuration and re-validate it.
pub fn merge_cli_overrides(config: &mut SheetConfig, overrides: &CliOverrides) -> Result<(), ConfigError> {
    if let Some(year) = overrides.year {
        config.api.year = Some(year);
    }
    if let Some(ref key_file) = overrides.key_file {
        config.api.key_file = key_file.clone();
    }
    if let Some(ref year_file) = overrides.year_file {
        config.api.year_file = year_file.clone();
    }
    if let Some(ref api_url) = overrides.api_url {
        config.api.base_url = api_url.clone();
    }
    if let Some(ref out_dir) = overrides.out_dir {
        config.output.dir = out_dir.clone();
    }
    check(config)
}

/// Season year: explicit setting, then the year file, then today's year.
pub fn resolve_year(config: &SheetConfig) -> Result<i32, ConfigError> {
    if let Some(year) = config.api.year {
        return Ok(year);
    }

    let path = &config.api.year_file;
    if path.is_file() {
        let value = fs::read_to_string(path)?.trim().to_string();
        return value.parse().map_err(|_| ConfigError::Year { path: path.clone(), value });
    }

    let year = chrono::Local::now().year();
    info!(year, "year file {} does not exist, using the current year", path.display());
    Ok(year)
}

/// Raw bytes of the API key file.
pub fn read_api_key(config: &SheetConfig) -> Result<Vec<u8>, ConfigError> {
    let path = &config.api.key_file;
    fs::read(path).map_err(|source| ConfigError::ApiKey { path: path.clone(), source })
}
