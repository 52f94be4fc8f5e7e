// Drives a headless engine through a synthetic workload with instrumentation
// attached and logs the captured statistics.
//
// Usage: instrumentation_replay [CONFIG_PATH] [FRAMES] [LOG_FILTER]

use anyhow::{bail, Context, Result};
use novade_render_instrumentation::{
    logging, ConfigLoader, EngineInstrumentation, HeadlessEngine, PerfCounter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "instrumentation.toml";
const DEFAULT_FRAMES: u64 = 240;
const QUERY_LATENCY_FRAMES: u32 = 2;
const RECORD_TIME: Duration = Duration::from_micros(9_000);
const SUBMIT_TIME: Duration = Duration::from_micros(7_667);
const SHADER_EVERY_N_FRAMES: u64 = 30;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let frames = match args.next() {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid frame count '{}'", raw))?,
        None => DEFAULT_FRAMES,
    };
    match args.next() {
        Some(filter) => logging::init_logging(&filter)?,
        None => logging::init_minimal_logging(),
    }

    let config = ConfigLoader::load_from_path(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    info!(?config, frames, "Starting instrumentation replay.");

    let engine = Arc::new(HeadlessEngine::new());
    engine.set_query_latency_frames(QUERY_LATENCY_FRAMES);
    let mut instrumentation =
        EngineInstrumentation::with_config_and_clock(engine.clone(), &config, engine.clock());

    // CPU side of each frame, split into the phases the replay simulates.
    let mut cpu_frame_time = PerfCounter::with_clock_and_window(engine.clock(), config.rolling_window());

    for frame in 0..frames {
        if frame % SHADER_EVERY_N_FRAMES == 0 {
            // Vary compile cost so min/max differ.
            let cost = Duration::from_millis(4 + (frame / SHADER_EVERY_N_FRAMES) % 9);
            engine.compile_shader(&format!("replay_{}", frame), cost);
        }

        cpu_frame_time.fetch_new_frame();
        engine.begin_frame();
        engine.clock().advance(RECORD_TIME);
        cpu_frame_time.add_count(RECORD_TIME.as_secs_f64() * 1000.0, false);
        engine.clock().advance(SUBMIT_TIME);
        cpu_frame_time.add_count(SUBMIT_TIME.as_secs_f64() * 1000.0, false);
        engine.end_frame();
        cpu_frame_time.end_frame();
    }

    let gpu = instrumentation.gpu_frame_time_counter();
    info!(
        enabled = instrumentation.capture_gpu_frame_time(),
        samples = gpu.count(),
        current_ns = gpu.current(),
        average_ns = gpu.average(),
        min_ns = gpu.min(),
        max_ns = gpu.max(),
        issued_queries = engine.issued_queries(),
        "GPU frame time."
    );

    let shaders = instrumentation.shader_compilation_time_counter();
    info!(
        enabled = instrumentation.capture_shader_compilation_time(),
        compiled = shaders.count(),
        total_ms = shaders.total(),
        average_ms = shaders.average(),
        last_sec_average_ms = shaders.last_sec_average(),
        "Shader compilation time."
    );

    info!(
        frames = cpu_frame_time.count(),
        average_ms = cpu_frame_time.average(),
        last_sec_average_ms = cpu_frame_time.last_sec_average(),
        "CPU frame time."
    );

    instrumentation.dispose();
    if engine.has_observers() {
        bail!("instrumentation left observers registered after dispose");
    }
    Ok(())
}
