//! Logging setup built on the `tracing` ecosystem.
//!
//! The library only emits `tracing` events. Binaries and tests decide where
//! they go by installing a subscriber with one of the functions below.

use crate::error::{InstrumentationError, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a stderr subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Errors (e.g. a global subscriber already being set) are ignored, so this
/// is safe to call from every test and from early startup.
pub fn init_minimal_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Installs a stderr subscriber using an explicit filter directive such as
/// `"info,instrumentation=trace"`.
pub fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).map_err(|e| {
        InstrumentationError::LoggingInitialization(format!(
            "invalid filter directive '{}': {}",
            filter, e
        ))
    })?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| InstrumentationError::LoggingInitialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_minimal_logging_is_idempotent() {
        init_minimal_logging();
        init_minimal_logging();
        tracing::info!("minimal logging initialized twice without panicking");
    }

    #[test]
    fn test_init_logging_rejects_invalid_directive() {
        let err = init_logging("instrumentation=notalevel").unwrap_err();
        assert!(matches!(err, InstrumentationError::LoggingInitialization(_)));
    }
}
