//! Rolling statistics for one instrumented metric.
//!
//! A [`PerfCounter`] tracks the current sample, the running average over all
//! sampling frames, the total, the frame count, min/max, and an average over
//! a short rolling window (one second by default).
//!
//! The counter is unit-agnostic. Values pushed through [`PerfCounter::add_count`]
//! keep whatever unit the caller uses; wall-clock brackets measured with
//! [`PerfCounter::begin_monitoring`] / [`PerfCounter::end_monitoring`] are
//! recorded in milliseconds.

use crate::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ROLLING_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct PerfCounter {
    clock: Arc<dyn Clock>,
    rolling_window: Duration,

    current: f64,
    min: f64,
    max: f64,
    average: f64,
    last_sec_average: f64,

    total_accumulated: f64,
    total_value_count: u64,
    has_samples: bool,

    last_sec_accumulated: f64,
    last_sec_value_count: u64,
    last_sec_time: Duration,

    start_monitoring_time: Option<Duration>,
}

impl PerfCounter {
    /// Creates a counter timed by a [`MonotonicClock`].
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_clock_and_window(clock, DEFAULT_ROLLING_WINDOW)
    }

    pub fn with_clock_and_window(clock: Arc<dyn Clock>, rolling_window: Duration) -> Self {
        let last_sec_time = clock.now();
        Self {
            clock,
            rolling_window,
            current: 0.0,
            min: 0.0,
            max: 0.0,
            average: 0.0,
            last_sec_average: 0.0,
            total_accumulated: 0.0,
            total_value_count: 0,
            has_samples: false,
            last_sec_accumulated: 0.0,
            last_sec_value_count: 0,
            last_sec_time,
            start_monitoring_time: None,
        }
    }

    /// Value of the most recent sampling frame.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Average over every sampling frame since creation.
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Sum of every committed value.
    pub fn total(&self) -> f64 {
        self.total_accumulated
    }

    /// Number of sampling frames started with [`PerfCounter::fetch_new_frame`].
    pub fn count(&self) -> u64 {
        self.total_value_count
    }

    /// Smallest committed value, `0.0` before the first commit.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest committed value, `0.0` before the first commit.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Average over the last completed rolling window.
    pub fn last_sec_average(&self) -> f64 {
        self.last_sec_average
    }

    pub fn rolling_window(&self) -> Duration {
        self.rolling_window
    }

    /// Whether a wall-clock bracket is open.
    pub fn is_monitoring(&self) -> bool {
        self.start_monitoring_time.is_some()
    }

    /// Starts a new sampling frame. The current value resets to zero.
    pub fn fetch_new_frame(&mut self) {
        self.total_value_count += 1;
        self.last_sec_value_count += 1;
        self.current = 0.0;
    }

    /// Adds `value` to the current sample.
    ///
    /// With `fetch_result` the current sample is committed to the statistics
    /// right away; otherwise it keeps accumulating until [`PerfCounter::end_frame`].
    pub fn add_count(&mut self, value: f64, fetch_result: bool) {
        self.current += value;
        if fetch_result {
            self.fetch_result();
        }
    }

    /// Marks the start of a wall-clock measurement.
    pub fn begin_monitoring(&mut self) {
        self.start_monitoring_time = Some(self.clock.now());
    }

    /// Closes the wall-clock measurement opened by [`PerfCounter::begin_monitoring`]
    /// and commits the elapsed milliseconds as the current sample.
    ///
    /// Does not start a new sampling frame. Returns the committed value, or
    /// `None` when no measurement was open.
    pub fn end_monitoring(&mut self) -> Option<f64> {
        let start = self.start_monitoring_time.take()?;
        let elapsed = self.clock.now().saturating_sub(start);
        self.current = duration_to_millis(elapsed);
        self.fetch_result();
        Some(self.current)
    }

    /// Drops an open wall-clock measurement without committing anything.
    pub fn cancel_monitoring(&mut self) {
        self.start_monitoring_time = None;
    }

    /// Commits whatever accumulated in the current sample.
    pub fn end_frame(&mut self) {
        self.fetch_result();
    }

    fn fetch_result(&mut self) {
        self.total_accumulated += self.current;
        self.last_sec_accumulated += self.current;

        if self.has_samples {
            self.min = self.min.min(self.current);
            self.max = self.max.max(self.current);
        } else {
            self.min = self.current;
            self.max = self.current;
            self.has_samples = true;
        }

        if self.total_value_count > 0 {
            self.average = self.total_accumulated / self.total_value_count as f64;
        }

        let now = self.clock.now();
        if now.saturating_sub(self.last_sec_time) > self.rolling_window {
            if self.last_sec_value_count > 0 {
                self.last_sec_average = self.last_sec_accumulated / self.last_sec_value_count as f64;
            }
            self.last_sec_time = now;
            self.last_sec_accumulated = 0.0;
            self.last_sec_value_count = 0;
        }
    }
}

impl Default for PerfCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_to_millis(duration: Duration) -> f64 {
    // Integer nanoseconds keep whole-millisecond durations exact.
    duration.as_nanos() as f64 / 1_000_000.0
}
