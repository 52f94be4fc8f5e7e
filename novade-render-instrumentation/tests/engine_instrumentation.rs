// novade-render-instrumentation/tests/engine_instrumentation.rs
//
// End-to-end scenarios against a scripted engine that speaks the raw
// sentinel convention of GPU timer-query APIs (negative = not ready).

use novade_render_instrumentation::{
    EngineInstrumentation, FrameEvent, ManualClock, Observable, QueryResolution, RenderEngine,
    ShaderCompilationEvent, TimingQueryToken,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct ScriptedEngine {
    begin_frame: Observable<FrameEvent>,
    end_frame: Observable<FrameEvent>,
    before_compilation: Observable<ShaderCompilationEvent>,
    after_compilation: Observable<ShaderCompilationEvent>,
    raw_results: Mutex<VecDeque<i64>>,
    issued: Mutex<Vec<TimingQueryToken>>,
    resolved: Mutex<Vec<TimingQueryToken>>,
}

impl ScriptedEngine {
    fn with_results(results: &[i64]) -> Arc<Self> {
        let engine = Self::default();
        engine.raw_results.lock().extend(results.iter().copied());
        Arc::new(engine)
    }

    fn frame(&self, frame_id: u64) {
        self.begin_frame.notify_observers(&FrameEvent { frame_id });
        self.end_frame.notify_observers(&FrameEvent { frame_id });
    }

    fn compile(&self, clock: &ManualClock, program_id: u64, duration: Duration) {
        let event = ShaderCompilationEvent {
            program_id,
            label: None,
        };
        self.before_compilation.notify_observers(&event);
        clock.advance(duration);
        self.after_compilation.notify_observers(&event);
    }

    fn observer_total(&self) -> usize {
        self.begin_frame.observer_count()
            + self.end_frame.observer_count()
            + self.before_compilation.observer_count()
            + self.after_compilation.observer_count()
    }

    fn issued_count(&self) -> usize {
        self.issued.lock().len()
    }
}

impl RenderEngine for ScriptedEngine {
    fn on_begin_frame(&self) -> &Observable<FrameEvent> {
        &self.begin_frame
    }

    fn on_end_frame(&self) -> &Observable<FrameEvent> {
        &self.end_frame
    }

    fn on_before_shader_compilation(&self) -> &Observable<ShaderCompilationEvent> {
        &self.before_compilation
    }

    fn on_after_shader_compilation(&self) -> &Observable<ShaderCompilationEvent> {
        &self.after_compilation
    }

    fn issue_timing_query(&self) -> Option<TimingQueryToken> {
        let mut issued = self.issued.lock();
        let token = TimingQueryToken::new(issued.len() as u64 + 1);
        issued.push(token);
        Some(token)
    }

    fn resolve_timing_query(&self, token: TimingQueryToken) -> QueryResolution {
        self.resolved.lock().push(token);
        let raw = self.raw_results.lock().pop_front().unwrap_or(-1);
        QueryResolution::from_raw(raw)
    }
}

fn instrument(engine: &Arc<ScriptedEngine>) -> (Arc<ManualClock>, EngineInstrumentation) {
    let clock = Arc::new(ManualClock::new());
    let instrumentation = EngineInstrumentation::with_clock(engine.clone(), clock.clone());
    (clock, instrumentation)
}

#[test]
fn test_resolved_gpu_query_becomes_current_and_average() {
    let engine = ScriptedEngine::with_results(&[5_000_000]);
    let (_, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);

    engine.frame(1);

    assert_eq!(instrumentation.current_gpu_frame_time(), 5_000_000.0);
    assert_eq!(instrumentation.average_gpu_frame_time(), 5_000_000.0);
    assert_eq!(instrumentation.outstanding_query(), None);
}

#[test]
fn test_not_ready_sentinel_keeps_token_and_statistics() {
    let engine = ScriptedEngine::with_results(&[-1, 7_000_000]);
    let (_, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);
    let before = instrumentation.current_gpu_frame_time();

    engine.frame(1);
    let token = instrumentation.outstanding_query();
    assert!(token.is_some());
    assert_eq!(instrumentation.current_gpu_frame_time(), before);
    assert_eq!(instrumentation.gpu_frame_time_counter().count(), 0);

    // Retried on the next end-frame, with the same token.
    engine.frame(2);
    assert_eq!(engine.resolved.lock().as_slice(), &[token.unwrap(), token.unwrap()]);
    assert_eq!(instrumentation.current_gpu_frame_time(), 7_000_000.0);
    assert_eq!(instrumentation.gpu_frame_time_counter().count(), 1);
}

#[test]
fn test_outstanding_query_blocks_new_queries() {
    let engine = ScriptedEngine::with_results(&[-1, -1, -1, 3_000_000]);
    let (_, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);

    for frame_id in 1..=3 {
        engine.frame(frame_id);
        assert_eq!(engine.issued_count(), 1);
    }

    engine.frame(4);
    assert_eq!(engine.issued_count(), 1);
    assert_eq!(instrumentation.outstanding_query(), None);

    // The next begin-frame is free to issue again.
    engine.begin_frame.notify_observers(&FrameEvent { frame_id: 5 });
    assert_eq!(engine.issued_count(), 2);
}

#[test]
fn test_only_non_negative_results_are_sampled() {
    let engine = ScriptedEngine::with_results(&[-1, 0, -5, 2_000_000, 4_000_000]);
    let (_, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);

    for frame_id in 1..=5 {
        engine.frame(frame_id);
    }

    let counter = instrumentation.gpu_frame_time_counter();
    assert_eq!(counter.count(), 3);
    assert_eq!(counter.total(), 6_000_000.0);
    assert_eq!(counter.current(), 4_000_000.0);
    assert_eq!(counter.average(), 2_000_000.0);
}

#[test]
fn test_shader_compilation_pair_produces_one_sample() {
    let engine = ScriptedEngine::with_results(&[]);
    let (clock, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_shader_compilation_time(true);

    engine.compile(&clock, 1, Duration::from_millis(12));

    assert_eq!(instrumentation.current_shader_compilation_time(), 12.0);
    assert_eq!(instrumentation.compiled_shaders_count(), 1);

    engine.compile(&clock, 2, Duration::from_millis(4));
    assert_eq!(instrumentation.compiled_shaders_count(), 2);
    assert_eq!(instrumentation.total_shader_compilation_time(), 16.0);
    assert_eq!(instrumentation.average_shader_compilation_time(), 8.0);
}

#[test]
fn test_capture_modes_are_independent() {
    let engine = ScriptedEngine::with_results(&[1_000]);
    let (clock, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_shader_compilation_time(true);

    engine.frame(1);
    engine.compile(&clock, 1, Duration::from_millis(2));

    assert_eq!(engine.issued_count(), 0);
    assert_eq!(instrumentation.gpu_frame_time_counter().count(), 0);
    assert_eq!(instrumentation.compiled_shaders_count(), 1);
}

#[test]
fn test_dispose_unregisters_regardless_of_toggle_state() {
    let engine = ScriptedEngine::with_results(&[]);
    let (_, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);
    instrumentation.set_capture_shader_compilation_time(true);
    instrumentation.set_capture_shader_compilation_time(false);
    assert_eq!(engine.observer_total(), 2);

    instrumentation.dispose();
    assert_eq!(engine.observer_total(), 0);
}

#[test]
fn test_disable_mid_query_then_dispose_freezes_statistics() {
    let engine = ScriptedEngine::with_results(&[6_000_000, -1, 9_000_000, 9_000_000]);
    let (clock, mut instrumentation) = instrument(&engine);
    instrumentation.set_capture_gpu_frame_time(true);
    instrumentation.set_capture_shader_compilation_time(true);

    engine.frame(1);
    engine.compile(&clock, 1, Duration::from_millis(3));
    engine.frame(2);
    assert!(instrumentation.outstanding_query().is_some());

    instrumentation.set_capture_gpu_frame_time(false);
    instrumentation.dispose();

    let resolved = engine.resolved.lock().len();
    for frame_id in 3..=6 {
        engine.frame(frame_id);
    }
    engine.compile(&clock, 2, Duration::from_millis(50));

    assert_eq!(engine.resolved.lock().len(), resolved);
    assert_eq!(instrumentation.current_gpu_frame_time(), 6_000_000.0);
    assert_eq!(instrumentation.average_gpu_frame_time(), 6_000_000.0);
    assert_eq!(instrumentation.current_shader_compilation_time(), 3.0);
    assert_eq!(instrumentation.compiled_shaders_count(), 1);
}
