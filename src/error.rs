//! # Error Types Module
//!
//! Centralized error handling for zen-holter.
//! One error type per concern, with context and error chaining.
//!
//! ## Error Types
//! - `PipelineError`: Structural problems in the signal-processing core
//!   (bad filter cutoffs, bad window parameters, empty or missing series)
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `RecordingError`: Reading recordings and writing result tables
//!
//! ## Missing Estimates Are Not Errors
//! A window with fewer than two beats, or an angle that is undefined for a
//! given orientation, is reported as `None` in the output. Only errors that
//! make the whole recording unusable are represented here.

use std::fmt;

/// Errors raised by the signal-processing core
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Invalid processing parameters (filter cutoffs, window sizes, rates)
    Configuration(String),
    /// Empty, malformed or missing input series
    InvalidInput(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            PipelineError::InvalidInput(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while reading a recording or writing its results
#[derive(Debug)]
pub enum RecordingError {
    /// Filesystem error
    Io(std::io::Error),
    /// CSV reader/writer error
    Csv(csv::Error),
    /// A row or channel that cannot be turned into a series
    Malformed { line: Option<u64>, reason: String },
    /// File extension or format not supported by this build
    UnknownFormat(String),
    /// HDF5 library error
    #[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
    Hdf5(String),
    /// The recording was read but could not be processed
    Pipeline(PipelineError),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::Io(e) => write!(f, "I/O error: {}", e),
            RecordingError::Csv(e) => write!(f, "CSV error: {}", e),
            RecordingError::Malformed {
                line: Some(line),
                reason,
            } => write!(f, "Malformed recording at line {}: {}", line, reason),
            RecordingError::Malformed { line: None, reason } => {
                write!(f, "Malformed recording: {}", reason)
            }
            RecordingError::UnknownFormat(what) => {
                write!(f, "Unsupported recording format: {}", what)
            }
            RecordingError::Hdf5(msg) => write!(f, "HDF5 error: {}", msg),
            RecordingError::Pipeline(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::Io(e) => Some(e),
            RecordingError::Csv(e) => Some(e),
            RecordingError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(e: std::io::Error) -> Self {
        RecordingError::Io(e)
    }
}

impl From<csv::Error> for RecordingError {
    fn from(e: csv::Error) -> Self {
        RecordingError::Csv(e)
    }
}

impl From<PipelineError> for RecordingError {
    fn from(e: PipelineError) -> Self {
        RecordingError::Pipeline(e)
    }
}
