//! Error handling for the render instrumentation crate.
//!
//! The instrumentation controller itself is infallible: toggling, reading and
//! disposing either succeed or are no-ops. Errors only arise around it, while
//! loading an [`InstrumentationConfig`](crate::config::InstrumentationConfig)
//! or initializing logging.
//!
//! The main error type is [`InstrumentationError`], which wraps the more
//! specific [`ConfigError`].

use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for instrumentation setup operations.
pub type Result<T> = std::result::Result<T, InstrumentationError>;

/// Top-level error type for the render instrumentation crate.
#[derive(Debug, Error)]
pub enum InstrumentationError {
    /// Errors related to configuration loading, parsing, or validation.
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    /// The tracing subscriber could not be installed.
    #[error("Logging Initialization Failed: {0}")]
    LoggingInitialization(String),

    /// General I/O errors not covered by the configuration variants.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for configuration-related operations.
///
/// Typically wrapped by [`InstrumentationError::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file from {path:?}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configuration parsed but holds values the controller cannot use.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
