//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config file is not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path of the file.
        path: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The merged configuration does not match the expected schema.
    #[error("invalid configuration: {0}")]
    SchemaError(String),

    /// A field holds an unusable value.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No home directory could be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
