//! # Configuration Management Module
//!
//! Processing parameters stored in a TOML file. Every field has a default, so
//! a partial file (or none at all) is valid.
//!
//! ## Sections
//! - `[heart_rate]`: ECG windowing, resampling, bandpass and beat threshold
//! - `[respiration]`: accelerometer windowing and stride reference
//! - `[output]`: result file format and name suffix
//! - `[batch]`: worker thread count
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/zen-holter/config.toml
//! - Linux: ~/.config/zen-holter/config.toml
//! - Windows: %APPDATA%\zen-holter\config.toml
//!
//! A file given with `--config` replaces the default location and is never
//! created on demand.

use crate::error::{ConfigError, PipelineError};
use crate::filter::BandpassFilter;
use crate::heart_rate::HeartRateConfig;
use crate::respiration::RespirationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Hdf5,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Hdf5 => "h5",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Hdf5 => write!(f, "hdf5"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "hdf5" | "h5" => Ok(OutputFormat::Hdf5),
            other => Err(format!("unknown output format '{}' (expected csv or hdf5)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Appended to the input file stem
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            suffix: "_results".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; available parallelism when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub heart_rate: HeartRateConfig,
    pub respiration: RespirationConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zen-holter")
            .join("config.toml")
    }

    /// Load config from the default location, or create it with defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_create(&Self::config_path())
    }

    fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(ConfigError::ParseFailed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                log::info!("Wrote default config to {}", path.display());
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Load config from an explicit file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFailed)?;
        toml::from_str(&contents).map_err(ConfigError::ParseFailed)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Reject parameters the estimators cannot run with
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.heart_rate.validate()?;
        self.respiration.validate()?;
        let hr = &self.heart_rate;
        BandpassFilter::design(hr.low_cut_hz, hr.high_cut_hz, hr.resample_hz as f64, hr.filter_order)?;
        if self.batch.workers == Some(0) {
            return Err(PipelineError::Configuration(
                "batch.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
