//! # NovaDE Render Instrumentation (`novade-render-instrumentation`)
//!
//! Opt-in performance instrumentation for NovaDE render engines. It measures
//! GPU frame execution time through timer queries and shader compilation wall
//! time, and keeps rolling statistics (current, average, total, count) for
//! both. A capture mode that is switched off registers nothing with the
//! engine and therefore costs nothing per frame.
//!
//! ## Components
//!
//! - [`instrumentation`]: [`EngineInstrumentation`], the controller that
//!   toggles both capture modes and owns their statistics.
//! - [`engine`]: the [`RenderEngine`] trait an engine implements to be
//!   instrumented, together with timer-query tokens and results.
//! - [`observable`]: [`Observable`], the engine's event subscription points.
//! - [`perf_counter`]: [`PerfCounter`], the statistics accumulator.
//! - [`clock`]: monotonic time sources for wall-clock measurements.
//! - [`headless`]: [`HeadlessEngine`], a GPU-less engine for tests and replays.
//! - [`config`], [`logging`], [`error`]: TOML configuration, `tracing`
//!   setup and the crate's error types.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use novade_render_instrumentation::{EngineInstrumentation, HeadlessEngine};
//!
//! let engine = Arc::new(HeadlessEngine::new());
//! engine.set_default_gpu_time(5_000_000);
//!
//! let mut instrumentation = EngineInstrumentation::with_clock(engine.clone(), engine.clock());
//! instrumentation.set_capture_gpu_frame_time(true);
//! instrumentation.set_capture_shader_compilation_time(true);
//!
//! engine.render_frame(Duration::from_millis(16));
//! engine.compile_shader("blit", Duration::from_millis(12));
//!
//! assert_eq!(instrumentation.current_gpu_frame_time(), 5_000_000.0);
//! assert_eq!(instrumentation.current_shader_compilation_time(), 12.0);
//! assert_eq!(instrumentation.compiled_shaders_count(), 1);
//!
//! instrumentation.dispose();
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod headless;
pub mod instrumentation;
pub mod logging;
pub mod observable;
pub mod perf_counter;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigLoader, InstrumentationConfig};
pub use engine::{
    FrameEvent, QueryResolution, RenderEngine, ShaderCompilationEvent, TimingQueryToken,
};
pub use error::{ConfigError, InstrumentationError, Result};
pub use headless::HeadlessEngine;
pub use instrumentation::{
    EngineInstrumentation, GpuFrameTimeCaptureState, ShaderCompilationCaptureState,
};
pub use observable::{Observable, ObserverHandle};
pub use perf_counter::PerfCounter;
