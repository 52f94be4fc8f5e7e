//! Opt-in GPU frame time and shader compilation time capture.
//!
//! [`EngineInstrumentation`] is bound to one [`RenderEngine`] for its whole
//! life. Each capture mode is a toggle: switching it on registers a pair of
//! observers on the engine's lifecycle events, switching it off removes them
//! again. While a mode is off nothing is registered, so it costs nothing per
//! frame.
//!
//! GPU frame time is measured with the engine's timer queries. A query is
//! issued at begin-frame and polled at every end-frame until the GPU has the
//! result; at most one query is in flight at a time. Results are in
//! nanoseconds.
//!
//! Shader compilation time is wall time between the before/after compilation
//! events, in milliseconds. Overlapping compilations are not supported: a
//! before-event that arrives while a measurement is open is ignored, and so is
//! any after-event for a program other than the one being measured.

use crate::clock::{Clock, MonotonicClock};
use crate::config::InstrumentationConfig;
use crate::engine::{
    FrameEvent, QueryResolution, RenderEngine, ShaderCompilationEvent, TimingQueryToken,
};
use crate::observable::ObserverHandle;
use crate::perf_counter::{PerfCounter, DEFAULT_ROLLING_WINDOW};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Observable state of the GPU frame time capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuFrameTimeCaptureState {
    Off,
    /// Capturing, no timer query outstanding.
    Idle,
    /// Capturing, a timer query waits to be resolved.
    InFlight,
}

/// Observable state of the shader compilation time capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCompilationCaptureState {
    Off,
    /// Capturing, no compilation being measured.
    Idle,
    /// Capturing, a compilation started and has not finished yet.
    Monitoring,
}

enum EngineBinding {
    Bound(Arc<dyn RenderEngine>),
    Disposed,
}

struct FrameHooks {
    begin_frame: ObserverHandle,
    end_frame: ObserverHandle,
}

struct CompilationHooks {
    before_compilation: ObserverHandle,
    after_compilation: ObserverHandle,
}

enum QueryPhase {
    Idle,
    InFlight(TimingQueryToken),
}

struct GpuFrameTimeProbe {
    phase: QueryPhase,
    counter: PerfCounter,
}

impl GpuFrameTimeProbe {
    fn on_begin_frame(&mut self, engine: &dyn RenderEngine, event: &FrameEvent) {
        if let QueryPhase::InFlight(_) = self.phase {
            return;
        }
        match engine.issue_timing_query() {
            Some(token) => {
                trace!(target: "instrumentation", frame = event.frame_id, %token, "Issued GPU timer query.");
                self.phase = QueryPhase::InFlight(token);
            }
            None => {
                trace!(target: "instrumentation", frame = event.frame_id, "Engine issued no GPU timer query.");
            }
        }
    }

    fn on_end_frame(&mut self, engine: &dyn RenderEngine, event: &FrameEvent) {
        let QueryPhase::InFlight(token) = self.phase else {
            return;
        };
        match engine.resolve_timing_query(token) {
            QueryResolution::NotReady => {
                trace!(target: "instrumentation", frame = event.frame_id, %token, "GPU timer query not ready, retrying next frame.");
            }
            QueryResolution::Elapsed(nanos) => {
                self.phase = QueryPhase::Idle;
                self.counter.fetch_new_frame();
                self.counter.add_count(nanos as f64, true);
                trace!(target: "instrumentation", frame = event.frame_id, %token, nanos, "Resolved GPU timer query.");
            }
        }
    }

    fn abandon_query(&mut self) {
        if let QueryPhase::InFlight(token) = self.phase {
            debug!(target: "instrumentation", %token, "Abandoning outstanding GPU timer query.");
        }
        self.phase = QueryPhase::Idle;
    }
}

enum CompilationPhase {
    Idle,
    Monitoring { program_id: u64 },
}

struct ShaderCompilationProbe {
    phase: CompilationPhase,
    counter: PerfCounter,
}

impl ShaderCompilationProbe {
    fn on_before_compilation(&mut self, event: &ShaderCompilationEvent) {
        if let CompilationPhase::Monitoring { program_id } = self.phase {
            debug!(
                target: "instrumentation",
                program = event.program_id,
                measured = program_id,
                "Shader compilation started while another is measured; ignored."
            );
            return;
        }
        self.phase = CompilationPhase::Monitoring {
            program_id: event.program_id,
        };
        self.counter.fetch_new_frame();
        self.counter.begin_monitoring();
    }

    fn on_after_compilation(&mut self, event: &ShaderCompilationEvent) {
        match self.phase {
            CompilationPhase::Monitoring { program_id } if program_id == event.program_id => {
                self.phase = CompilationPhase::Idle;
                if let Some(millis) = self.counter.end_monitoring() {
                    trace!(target: "instrumentation", program = program_id, millis, "Recorded shader compilation time.");
                }
            }
            _ => {
                debug!(
                    target: "instrumentation",
                    program = event.program_id,
                    "Shader compilation finished without a matching start; ignored."
                );
            }
        }
    }

    fn cancel(&mut self) {
        self.phase = CompilationPhase::Idle;
        self.counter.cancel_monitoring();
    }
}

/// Measures GPU frame time and shader compilation time of one engine.
///
/// Both capture modes start disabled. Dropping the instrumentation disposes
/// it, which unregisters every observer it still holds.
pub struct EngineInstrumentation {
    binding: EngineBinding,
    gpu_frame_time: Arc<Mutex<GpuFrameTimeProbe>>,
    shader_compilation: Arc<Mutex<ShaderCompilationProbe>>,
    gpu_hooks: Option<FrameHooks>,
    compilation_hooks: Option<CompilationHooks>,
}

impl EngineInstrumentation {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self::with_clock(engine, Arc::new(MonotonicClock::new()))
    }

    /// Uses `clock` for wall-clock measurements and rolling averages.
    pub fn with_clock(engine: Arc<dyn RenderEngine>, clock: Arc<dyn Clock>) -> Self {
        Self::bind(engine, clock, DEFAULT_ROLLING_WINDOW)
    }

    /// Creates the instrumentation and applies the toggles found in `config`.
    pub fn with_config(engine: Arc<dyn RenderEngine>, config: &InstrumentationConfig) -> Self {
        Self::with_config_and_clock(engine, config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_config_and_clock(
        engine: Arc<dyn RenderEngine>,
        config: &InstrumentationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut instrumentation = Self::bind(engine, clock, config.rolling_window());
        instrumentation.set_capture_gpu_frame_time(config.capture_gpu_frame_time);
        instrumentation.set_capture_shader_compilation_time(config.capture_shader_compilation_time);
        instrumentation
    }

    fn bind(engine: Arc<dyn RenderEngine>, clock: Arc<dyn Clock>, rolling_window: Duration) -> Self {
        Self {
            binding: EngineBinding::Bound(engine),
            gpu_frame_time: Arc::new(Mutex::new(GpuFrameTimeProbe {
                phase: QueryPhase::Idle,
                counter: PerfCounter::with_clock_and_window(clock.clone(), rolling_window),
            })),
            shader_compilation: Arc::new(Mutex::new(ShaderCompilationProbe {
                phase: CompilationPhase::Idle,
                counter: PerfCounter::with_clock_and_window(clock, rolling_window),
            })),
            gpu_hooks: None,
            compilation_hooks: None,
        }
    }

    // --- GPU frame time ---

    /// Last resolved GPU frame time, in nanoseconds.
    pub fn current_gpu_frame_time(&self) -> f64 {
        self.gpu_frame_time.lock().counter.current()
    }

    /// Average GPU frame time over all resolved queries, in nanoseconds.
    pub fn average_gpu_frame_time(&self) -> f64 {
        self.gpu_frame_time.lock().counter.average()
    }

    /// Snapshot of the GPU frame time statistics.
    pub fn gpu_frame_time_counter(&self) -> PerfCounter {
        self.gpu_frame_time.lock().counter.clone()
    }

    /// Token of the timer query waiting to be resolved, if any.
    pub fn outstanding_query(&self) -> Option<TimingQueryToken> {
        match self.gpu_frame_time.lock().phase {
            QueryPhase::InFlight(token) => Some(token),
            QueryPhase::Idle => None,
        }
    }

    pub fn capture_gpu_frame_time(&self) -> bool {
        self.gpu_hooks.is_some()
    }

    pub fn gpu_frame_time_state(&self) -> GpuFrameTimeCaptureState {
        if !self.capture_gpu_frame_time() {
            return GpuFrameTimeCaptureState::Off;
        }
        match self.gpu_frame_time.lock().phase {
            QueryPhase::Idle => GpuFrameTimeCaptureState::Idle,
            QueryPhase::InFlight(_) => GpuFrameTimeCaptureState::InFlight,
        }
    }

    /// Enables or disables GPU frame time capture. Setting the current value
    /// again does nothing.
    ///
    /// Disabling keeps the statistics gathered so far. A query still in
    /// flight is abandoned and never resolved.
    pub fn set_capture_gpu_frame_time(&mut self, value: bool) {
        if value == self.capture_gpu_frame_time() {
            return;
        }
        let Some(engine) = self.engine() else {
            warn!(target: "instrumentation", "Ignoring GPU frame time toggle on disposed instrumentation.");
            return;
        };

        if value {
            let weak_engine = Arc::downgrade(&engine);
            let probe = Arc::clone(&self.gpu_frame_time);
            let begin_frame = engine.on_begin_frame().add(move |event: &FrameEvent| {
                if let Some(engine) = weak_engine.upgrade() {
                    probe.lock().on_begin_frame(engine.as_ref(), event);
                }
            });

            let weak_engine = Arc::downgrade(&engine);
            let probe = Arc::clone(&self.gpu_frame_time);
            let end_frame = engine.on_end_frame().add(move |event: &FrameEvent| {
                if let Some(engine) = weak_engine.upgrade() {
                    probe.lock().on_end_frame(engine.as_ref(), event);
                }
            });

            self.gpu_hooks = Some(FrameHooks { begin_frame, end_frame });
            info!(target: "instrumentation", "GPU frame time capture enabled.");
        } else {
            self.unhook_gpu_frame_time(engine.as_ref());
            info!(target: "instrumentation", "GPU frame time capture disabled.");
        }
    }

    fn unhook_gpu_frame_time(&mut self, engine: &dyn RenderEngine) {
        if let Some(hooks) = self.gpu_hooks.take() {
            engine.on_begin_frame().remove(&hooks.begin_frame);
            engine.on_end_frame().remove(&hooks.end_frame);
        }
        self.gpu_frame_time.lock().abandon_query();
    }

    // --- Shader compilation time ---

    /// Duration of the last measured compilation, in milliseconds.
    pub fn current_shader_compilation_time(&self) -> f64 {
        self.shader_compilation.lock().counter.current()
    }

    /// Average compilation duration, in milliseconds.
    pub fn average_shader_compilation_time(&self) -> f64 {
        self.shader_compilation.lock().counter.average()
    }

    /// Time spent compiling shaders since capture started, in milliseconds.
    pub fn total_shader_compilation_time(&self) -> f64 {
        self.shader_compilation.lock().counter.total()
    }

    pub fn compiled_shaders_count(&self) -> u64 {
        self.shader_compilation.lock().counter.count()
    }

    /// Snapshot of the shader compilation statistics.
    pub fn shader_compilation_time_counter(&self) -> PerfCounter {
        self.shader_compilation.lock().counter.clone()
    }

    pub fn capture_shader_compilation_time(&self) -> bool {
        self.compilation_hooks.is_some()
    }

    pub fn shader_compilation_state(&self) -> ShaderCompilationCaptureState {
        if !self.capture_shader_compilation_time() {
            return ShaderCompilationCaptureState::Off;
        }
        match self.shader_compilation.lock().phase {
            CompilationPhase::Idle => ShaderCompilationCaptureState::Idle,
            CompilationPhase::Monitoring { .. } => ShaderCompilationCaptureState::Monitoring,
        }
    }

    /// Enables or disables shader compilation time capture. Setting the
    /// current value again does nothing.
    pub fn set_capture_shader_compilation_time(&mut self, value: bool) {
        if value == self.capture_shader_compilation_time() {
            return;
        }
        let Some(engine) = self.engine() else {
            warn!(target: "instrumentation", "Ignoring shader compilation toggle on disposed instrumentation.");
            return;
        };

        if value {
            let probe = Arc::clone(&self.shader_compilation);
            let before_compilation = engine
                .on_before_shader_compilation()
                .add(move |event: &ShaderCompilationEvent| {
                    probe.lock().on_before_compilation(event);
                });

            let probe = Arc::clone(&self.shader_compilation);
            let after_compilation = engine
                .on_after_shader_compilation()
                .add(move |event: &ShaderCompilationEvent| {
                    probe.lock().on_after_compilation(event);
                });

            self.compilation_hooks = Some(CompilationHooks {
                before_compilation,
                after_compilation,
            });
            info!(target: "instrumentation", "Shader compilation time capture enabled.");
        } else {
            self.unhook_shader_compilation(engine.as_ref());
            info!(target: "instrumentation", "Shader compilation time capture disabled.");
        }
    }

    fn unhook_shader_compilation(&mut self, engine: &dyn RenderEngine) {
        if let Some(hooks) = self.compilation_hooks.take() {
            engine
                .on_before_shader_compilation()
                .remove(&hooks.before_compilation);
            engine
                .on_after_shader_compilation()
                .remove(&hooks.after_compilation);
        }
        self.shader_compilation.lock().cancel();
    }

    // --- Lifecycle ---

    pub fn is_disposed(&self) -> bool {
        matches!(self.binding, EngineBinding::Disposed)
    }

    /// Unregisters every observer still held and releases the engine.
    ///
    /// Statistics stay readable afterwards but never change again. Toggling a
    /// disposed instrumentation is a contract violation and is ignored.
    /// Calling `dispose` again does nothing.
    pub fn dispose(&mut self) {
        let engine = match std::mem::replace(&mut self.binding, EngineBinding::Disposed) {
            EngineBinding::Bound(engine) => engine,
            EngineBinding::Disposed => return,
        };
        self.unhook_gpu_frame_time(engine.as_ref());
        self.unhook_shader_compilation(engine.as_ref());
        info!(target: "instrumentation", "Engine instrumentation disposed.");
    }

    fn engine(&self) -> Option<Arc<dyn RenderEngine>> {
        match &self.binding {
            EngineBinding::Bound(engine) => Some(Arc::clone(engine)),
            EngineBinding::Disposed => None,
        }
    }
}

impl Drop for EngineInstrumentation {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for EngineInstrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInstrumentation")
            .field("disposed", &self.is_disposed())
            .field("gpu_frame_time", &self.gpu_frame_time_state())
            .field("shader_compilation", &self.shader_compilation_state())
            .finish()
    }
}
