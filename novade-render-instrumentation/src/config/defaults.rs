//! Default configuration values.
//!
//! Referenced by `serde`'s `default` attributes in [`super::InstrumentationConfig`].

/// Both capture modes are opt-in.
pub(super) fn default_capture() -> bool {
    false
}

/// Returns the default rolling window for the "last second" average (`1000` ms).
pub(super) fn default_rolling_window_ms() -> u64 {
    1000
}
