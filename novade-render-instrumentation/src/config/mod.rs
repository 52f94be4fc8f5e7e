//! Configuration for render instrumentation.
//!
//! [`InstrumentationConfig`] decides which capture modes start enabled and
//! how wide the accumulators' rolling window is. It is usually read from a
//! TOML file through [`ConfigLoader`]:
//!
//! ```toml
//! capture_gpu_frame_time = true
//! capture_shader_compilation_time = false
//! rolling_window_ms = 1000
//! ```
//!
//! Missing fields take the values from [`defaults`]; unknown fields are
//! rejected.

mod defaults;
pub mod loader;

pub use loader::ConfigLoader;

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Startup settings for an
/// [`EngineInstrumentation`](crate::instrumentation::EngineInstrumentation).
///
/// # Examples
///
/// ```
/// use novade_render_instrumentation::config::InstrumentationConfig;
///
/// let config = InstrumentationConfig::from_toml_str("capture_gpu_frame_time = true").unwrap();
/// assert!(config.capture_gpu_frame_time);
/// assert!(!config.capture_shader_compilation_time);
/// assert_eq!(config.rolling_window_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationConfig {
    /// Measure GPU frame time through timer queries.
    #[serde(default = "defaults::default_capture")]
    pub capture_gpu_frame_time: bool,
    /// Measure wall time spent compiling shaders.
    #[serde(default = "defaults::default_capture")]
    pub capture_shader_compilation_time: bool,
    /// Width of the rolling window behind `last_sec_average`, in milliseconds.
    /// Must be greater than zero.
    #[serde(default = "defaults::default_rolling_window_ms")]
    pub rolling_window_ms: u64,
}

impl InstrumentationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: InstrumentationConfig =
            toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.rolling_window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "rolling_window_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            capture_gpu_frame_time: defaults::default_capture(),
            capture_shader_compilation_time: defaults::default_capture(),
            rolling_window_ms: defaults::default_rolling_window_ms(),
        }
    }
}
