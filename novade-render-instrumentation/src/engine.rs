//! The slice of a render engine that instrumentation observes.
//!
//! Instrumentation never renders, compiles shaders, or talks to a GPU API.
//! It only needs the engine's lifecycle events and its timer-query
//! primitives, which [`RenderEngine`] collects into one trait.

use crate::observable::Observable;
use std::fmt;

/// Payload of the begin-frame and end-frame events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEvent {
    pub frame_id: u64,
}

/// Payload of the before/after shader compilation events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompilationEvent {
    pub program_id: u64,
    pub label: Option<String>,
}

/// Handle to a GPU timer query that was issued but not yet resolved.
///
/// Tokens order by issuance when the engine hands out increasing raw ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimingQueryToken(u64);

impl TimingQueryToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimingQueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

/// Outcome of asking the engine for a timer query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResolution {
    /// The GPU has not produced the result yet; ask again later.
    NotReady,
    /// Elapsed GPU time in nanoseconds.
    Elapsed(u64),
}

impl QueryResolution {
    /// Maps the raw sentinel convention used by GPU query APIs: any negative
    /// value means "not ready", anything else is the elapsed time.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            QueryResolution::NotReady
        } else {
            QueryResolution::Elapsed(raw as u64)
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, QueryResolution::Elapsed(_))
    }
}

impl From<i64> for QueryResolution {
    fn from(raw: i64) -> Self {
        QueryResolution::from_raw(raw)
    }
}

/// Everything instrumentation consumes from an engine.
///
/// Observers registered on the four event sources are invoked synchronously
/// from the engine's frame loop. Implementations must not notify these
/// sources from inside `issue_timing_query` or `resolve_timing_query`.
pub trait RenderEngine: Send + Sync {
    fn on_begin_frame(&self) -> &Observable<FrameEvent>;

    fn on_end_frame(&self) -> &Observable<FrameEvent>;

    fn on_before_shader_compilation(&self) -> &Observable<ShaderCompilationEvent>;

    fn on_after_shader_compilation(&self) -> &Observable<ShaderCompilationEvent>;

    /// Starts a GPU timer query.
    ///
    /// Returns `None` when no query can be issued, e.g. because the device
    /// lacks timer-query support.
    fn issue_timing_query(&self) -> Option<TimingQueryToken>;

    /// Polls the result of a previously issued query without blocking.
    fn resolve_timing_query(&self, token: TimingQueryToken) -> QueryResolution;
}
