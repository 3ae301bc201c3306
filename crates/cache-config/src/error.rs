//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to merge or extract the layered sources.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// A required value was missing from every layer (env, file, default).
    #[error("missing required configuration value: {key}")]
    MissingRequired {
        /// The configuration key that had no value anywhere.
        key: String,
    },

    /// A configuration value was present but not valid.
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
