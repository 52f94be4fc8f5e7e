//! A render engine without a GPU.
//!
//! [`HeadlessEngine`] fires the same lifecycle events as a real engine and
//! answers timer queries from a script, with time driven by a
//! [`ManualClock`]. It lets instrumentation run deterministically in tests
//! and in the `instrumentation_replay` tool.

use crate::clock::ManualClock;
use crate::engine::{
    FrameEvent, QueryResolution, RenderEngine, ShaderCompilationEvent, TimingQueryToken,
};
use crate::observable::Observable;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// GPU time reported for unscripted queries (one 60 Hz frame).
pub const DEFAULT_GPU_TIME_NS: u64 = 16_666_667;

/// Unresolved queries kept before the oldest is forgotten. Abandoned queries
/// are never resolved, so without a bound they would pile up.
pub const MAX_PENDING_QUERIES: usize = 16;

#[derive(Debug)]
struct HeadlessState {
    frame_id: u64,
    next_program_id: u64,
    next_query: u64,
    timer_queries_supported: bool,
    default_gpu_time_ns: u64,
    query_latency_frames: u32,
    scripted_results: VecDeque<QueryResolution>,
    // Remaining "not ready" answers per unscripted query, oldest first.
    pending: BTreeMap<TimingQueryToken, u32>,
    issued_queries: u64,
    resolve_attempts: u64,
}

#[derive(Debug)]
pub struct HeadlessEngine {
    clock: Arc<ManualClock>,
    begin_frame: Observable<FrameEvent>,
    end_frame: Observable<FrameEvent>,
    before_shader_compilation: Observable<ShaderCompilationEvent>,
    after_shader_compilation: Observable<ShaderCompilationEvent>,
    state: Mutex<HeadlessState>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::new()))
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            begin_frame: Observable::new(),
            end_frame: Observable::new(),
            before_shader_compilation: Observable::new(),
            after_shader_compilation: Observable::new(),
            state: Mutex::new(HeadlessState {
                frame_id: 0,
                next_program_id: 1,
                next_query: 1,
                timer_queries_supported: true,
                default_gpu_time_ns: DEFAULT_GPU_TIME_NS,
                query_latency_frames: 0,
                scripted_results: VecDeque::new(),
                pending: BTreeMap::new(),
                issued_queries: 0,
                resolve_attempts: 0,
            }),
        }
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// GPU time reported by unscripted queries once they are ready.
    pub fn set_default_gpu_time(&self, nanos: u64) {
        self.state.lock().default_gpu_time_ns = nanos;
    }

    /// Number of resolve attempts an unscripted query answers with
    /// [`QueryResolution::NotReady`] before reporting its result.
    pub fn set_query_latency_frames(&self, frames: u32) {
        self.state.lock().query_latency_frames = frames;
    }

    /// When unsupported, `issue_timing_query` returns `None`.
    pub fn set_timer_queries_supported(&self, supported: bool) {
        self.state.lock().timer_queries_supported = supported;
    }

    /// Queues answers for upcoming resolve attempts, consumed one per attempt
    /// before the default latency model applies.
    pub fn script_query_results<I>(&self, results: I)
    where
        I: IntoIterator<Item = QueryResolution>,
    {
        self.state.lock().scripted_results.extend(results);
    }

    pub fn issued_queries(&self) -> u64 {
        self.state.lock().issued_queries
    }

    pub fn resolve_attempts(&self) -> u64 {
        self.state.lock().resolve_attempts
    }

    /// Issued queries that have not produced a result yet.
    pub fn pending_queries(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether anything is still subscribed to any of the engine's events.
    pub fn has_observers(&self) -> bool {
        self.begin_frame.has_observers()
            || self.end_frame.has_observers()
            || self.before_shader_compilation.has_observers()
            || self.after_shader_compilation.has_observers()
    }

    pub fn frame_id(&self) -> u64 {
        self.state.lock().frame_id
    }

    /// Starts a new frame and notifies begin-frame observers.
    pub fn begin_frame(&self) {
        let frame_id = {
            let mut state = self.state.lock();
            state.frame_id += 1;
            state.frame_id
        };
        self.begin_frame.notify_observers(&FrameEvent { frame_id });
    }

    /// Notifies end-frame observers for the current frame.
    pub fn end_frame(&self) {
        let frame_id = self.frame_id();
        self.end_frame.notify_observers(&FrameEvent { frame_id });
    }

    /// Runs one full frame taking `cpu_time` of wall time.
    pub fn render_frame(&self, cpu_time: Duration) {
        self.begin_frame();
        self.clock.advance(cpu_time);
        self.end_frame();
    }

    /// Simulates compiling a shader program for `duration` and returns its id.
    pub fn compile_shader(&self, label: &str, duration: Duration) -> u64 {
        let program_id = {
            let mut state = self.state.lock();
            let id = state.next_program_id;
            state.next_program_id += 1;
            id
        };
        let event = ShaderCompilationEvent {
            program_id,
            label: Some(label.to_string()),
        };

        self.before_shader_compilation.notify_observers(&event);
        self.clock.advance(duration);
        self.after_shader_compilation.notify_observers(&event);
        program_id
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for HeadlessEngine {
    fn on_begin_frame(&self) -> &Observable<FrameEvent> {
        &self.begin_frame
    }

    fn on_end_frame(&self) -> &Observable<FrameEvent> {
        &self.end_frame
    }

    fn on_before_shader_compilation(&self) -> &Observable<ShaderCompilationEvent> {
        &self.before_shader_compilation
    }

    fn on_after_shader_compilation(&self) -> &Observable<ShaderCompilationEvent> {
        &self.after_shader_compilation
    }

    fn issue_timing_query(&self) -> Option<TimingQueryToken> {
        let mut state = self.state.lock();
        if !state.timer_queries_supported {
            return None;
        }
        let token = TimingQueryToken::new(state.next_query);
        state.next_query += 1;
        state.issued_queries += 1;
        let latency = state.query_latency_frames;
        if state.pending.len() >= MAX_PENDING_QUERIES {
            if let Some((stale, _)) = state.pending.pop_first() {
                debug!(token = %stale, "Headless engine dropped a stale timer query.");
            }
        }
        state.pending.insert(token, latency);
        trace!(%token, latency, "Headless engine issued timer query.");
        Some(token)
    }

    fn resolve_timing_query(&self, token: TimingQueryToken) -> QueryResolution {
        let mut state = self.state.lock();
        state.resolve_attempts += 1;

        if let Some(result) = state.scripted_results.pop_front() {
            if result.is_ready() {
                state.pending.remove(&token);
            }
            return result;
        }

        match state.pending.get(&token).copied() {
            Some(0) => {
                state.pending.remove(&token);
                QueryResolution::Elapsed(state.default_gpu_time_ns)
            }
            Some(remaining) => {
                state.pending.insert(token, remaining - 1);
                QueryResolution::NotReady
            }
            None => {
                warn!(%token, "Headless engine asked to resolve an unknown timer query.");
                QueryResolution::NotReady
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_frames_carry_increasing_ids() {
        let engine = HeadlessEngine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = engine
            .on_end_frame()
            .add(move |event: &FrameEvent| sink.lock().push(event.frame_id));

        assert!(engine.has_observers());
        engine.render_frame(Duration::from_millis(1));
        engine.render_frame(Duration::from_millis(1));
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(engine.clock().now(), Duration::from_millis(2));
    }

    #[test]
    fn test_unscripted_query_honours_latency() {
        let engine = HeadlessEngine::new();
        engine.set_query_latency_frames(2);
        engine.set_default_gpu_time(1_000);

        let token = engine.issue_timing_query().unwrap();
        assert_eq!(engine.resolve_timing_query(token), QueryResolution::NotReady);
        assert_eq!(engine.resolve_timing_query(token), QueryResolution::NotReady);
        assert_eq!(engine.resolve_timing_query(token), QueryResolution::Elapsed(1_000));
        assert_eq!(engine.resolve_attempts(), 3);
        assert_eq!(engine.issued_queries(), 1);
    }

    #[test]
    fn test_pending_queries_are_bounded() {
        let engine = HeadlessEngine::new();
        engine.set_query_latency_frames(100);
        let first = engine.issue_timing_query().unwrap();
        for _ in 0..MAX_PENDING_QUERIES {
            engine.issue_timing_query().unwrap();
        }

        assert_eq!(engine.pending_queries(), MAX_PENDING_QUERIES);
        assert_eq!(engine.issued_queries(), MAX_PENDING_QUERIES as u64 + 1);
        // The oldest query was forgotten and can no longer resolve.
        engine.set_default_gpu_time(1);
        engine.set_query_latency_frames(0);
        assert_eq!(engine.resolve_timing_query(first), QueryResolution::NotReady);
    }

    #[test]
    fn test_resolved_queries_leave_the_pending_set() {
        let engine = HeadlessEngine::new();
        let token = engine.issue_timing_query().unwrap();
        assert_eq!(engine.pending_queries(), 1);
        assert!(engine.resolve_timing_query(token).is_ready());
        assert_eq!(engine.pending_queries(), 0);
    }

    #[test]
    fn test_scripted_results_take_precedence() {
        let engine = HeadlessEngine::new();
        engine.script_query_results([
            QueryResolution::from_raw(-1),
            QueryResolution::from_raw(42),
        ]);

        let token = engine.issue_timing_query().unwrap();
        assert_eq!(engine.resolve_timing_query(token), QueryResolution::NotReady);
        assert_eq!(engine.resolve_timing_query(token), QueryResolution::Elapsed(42));
    }

    #[test]
    fn test_unsupported_timer_queries() {
        let engine = HeadlessEngine::new();
        engine.set_timer_queries_supported(false);
        assert!(engine.issue_timing_query().is_none());
        assert_eq!(engine.issued_queries(), 0);
    }

    #[test]
    fn test_compile_shader_brackets_the_clock() {
        let engine = HeadlessEngine::new();
        let started_at = Arc::new(AtomicU64::new(u64::MAX));
        let finished_at = Arc::new(AtomicU64::new(u64::MAX));

        let clock = engine.clock();
        let start = Arc::clone(&started_at);
        let _before = engine.on_before_shader_compilation().add(move |_: &ShaderCompilationEvent| {
            start.store(clock.now().as_millis() as u64, Ordering::SeqCst);
        });
        let clock = engine.clock();
        let finish = Arc::clone(&finished_at);
        let _after = engine.on_after_shader_compilation().add(move |_: &ShaderCompilationEvent| {
            finish.store(clock.now().as_millis() as u64, Ordering::SeqCst);
        });

        let first = engine.compile_shader("sprite", Duration::from_millis(12));
        let second = engine.compile_shader("blur", Duration::from_millis(3));
        assert_eq!(started_at.load(Ordering::SeqCst), 12);
        assert_eq!(finished_at.load(Ordering::SeqCst), 15);
        assert_eq!((first, second), (1, 2));
    }
}
