//! Custom error types for driftwatch.
//!
//! Configuration problems are detected before any aggregation runs and are
//! kept apart from data problems found while computing statistics, so callers
//! (and the CLI exit code) can tell a bad invocation from a bad dataset.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for driftwatch operations
#[derive(Error, Debug)]
pub enum DriftError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load or interpret configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Unknown drift metric name
    #[error("Unknown drift metric '{name}'. Valid metrics: PSI, JSD, HD, KS, all")]
    UnknownMetric { name: String },

    /// Requested attribute missing or not numeric
    #[error("Invalid input for column(s): {attribute} - {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    /// Feature formula could not be parsed
    #[error("Invalid feature formula '{formula}': {reason}")]
    Formula { formula: String, reason: String },

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Dataset content prevents the computation
    #[error("Data error: {message}")]
    Data { message: String },

    /// Dataset has no rows
    #[error("Dataset '{dataset}' has zero rows; bin probabilities are undefined")]
    EmptyDataset { dataset: String },

    /// Feature attributes do not share statistics for every period
    #[error("Attribute '{attribute}' has no statistics for period {period}; all attributes of a feature must cover the same periods")]
    MissingPeriod { attribute: String, period: u32 },

    /// Persisted table could not be interpreted
    #[error("Malformed table at {path}: {reason}")]
    MalformedTable { path: PathBuf, reason: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// CSV error wrapper
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriftError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid-configuration error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-attribute error
    pub fn invalid_attribute(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create a formula error
    pub fn formula(formula: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Formula {
            formula: formula.into(),
            reason: reason.into(),
        }
    }

    /// Create a data error
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Create a malformed-table error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error was raised by configuration validation
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownMetric { .. }
                | Self::InvalidAttribute { .. }
                | Self::Formula { .. }
                | Self::Toml(_)
        )
    }

    /// Check if this error was raised by the data itself
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::Data { .. }
                | Self::EmptyDataset { .. }
                | Self::MissingPeriod { .. }
                | Self::MalformedTable { .. }
                | Self::Csv(_)
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            return 7;
        }
        if self.is_data_error() {
            return 3;
        }
        match self {
            Self::Io(_) => 6,
            _ => 1,
        }
    }
}

/// Type alias for driftwatch results
pub type Result<T> = std::result::Result<T, DriftError>;

/// Extension trait for converting foreign errors to DriftError
pub trait IntoDriftError<T> {
    fn into_drift_config(self) -> Result<T>;
    fn into_drift_data(self) -> Result<T>;
}

impl<T, E: Into<anyhow::Error>> IntoDriftError<T> for std::result::Result<T, E> {
    fn into_drift_config(self) -> Result<T> {
        self.map_err(|e| DriftError::config(e.into().to_string()))
    }

    fn into_drift_data(self) -> Result<T> {
        self.map_err(|e| DriftError::data(e.into().to_string()))
    }
}
