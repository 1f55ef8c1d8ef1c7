//! Configuration schema types for `avatars.toml`
//!
//! Every section and field is optional; missing values fall back to the
//! layout the map project has always used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fetch::DEFAULT_API_URL;
use crate::output::OutputPaths;

/// Events API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, without the year
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// File holding the raw `user:token` API key
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    /// Optional file overriding the season year
    #[serde(default = "default_year_file")]
    pub year_file: PathBuf,
    /// Season year; wins over the year file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_key_file() -> PathBuf {
    PathBuf::from("FRC_API_KEY")
}

fn default_year_file() -> PathBuf {
    PathBuf::from("YEAR")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_file: default_key_file(),
            year_file: default_year_file(),
            year: None,
        }
    }
}

/// Input files, relative to the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    #[serde(default = "default_teams")]
    pub teams: PathBuf,
    #[serde(default = "default_manifest")]
    pub legacy_manifest: PathBuf,
    #[serde(default = "default_sheet")]
    pub legacy_sheet: PathBuf,
}

fn default_teams() -> PathBuf {
    PathBuf::from("teams.json")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("avatars.json")
}

fn default_sheet() -> PathBuf {
    PathBuf::from("avatars.png")
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            teams: default_teams(),
            legacy_manifest: default_manifest(),
            legacy_sheet: default_sheet(),
        }
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory both outputs are written to
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    #[serde(default = "default_sheet")]
    pub sheet: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_out_dir(), manifest: default_manifest(), sheet: default_sheet() }
    }
}

/// Root of `avatars.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "output.sheet")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "avatars.toml: '{}' {}", self.field, self.message)
    }
}

impl SheetConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            errors.push(ConfigValidationError {
                field: "api.base_url".to_string(),
                message: "must be an http:// or https:// URL".to_string(),
            });
        }

        let files = [
            ("api.key_file", &self.api.key_file),
            ("input.teams", &self.input.teams),
            ("input.legacy_manifest", &self.input.legacy_manifest),
            ("input.legacy_sheet", &self.input.legacy_sheet),
            ("output.manifest", &self.output.manifest),
            ("output.sheet", &self.output.sheet),
        ];
        for (field, path) in files {
            if path.as_os_str().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be a non-empty path".to_string(),
                });
            }
        }

        if self.output.manifest == self.output.sheet {
            errors.push(ConfigValidationError {
                field: "output.sheet".to_string(),
                message: "must differ from output.manifest".to_string(),
            });
        }

        errors
    }

    /// Paths of the teams file and legacy pair inside `data_dir`.
    pub fn input_paths(&self, data_dir: &Path) -> InputPaths {
        InputPaths {
            teams: data_dir.join(&self.input.teams),
            legacy_manifest: data_dir.join(&self.input.legacy_manifest),
            legacy_sheet: data_dir.join(&self.input.legacy_sheet),
        }
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths {
            manifest: self.output.dir.join(&self.output.manifest),
            sheet: self.output.dir.join(&self.output.sheet),
        }
    }
}

/// Resolved input file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub teams: PathBuf,
    pub legacy_manifest: PathBuf,
    pub legacy_sheet: PathBuf,
}
