use anyhow::Result;
use ilm_experiment::{ExperimentConfig, ExperimentRunner, JsonResultWriter, RunOutcome};
use ilm_render::load_font;
use ilm_timing::HighPrecisionTimer;
use tracing::{info, warn};

mod app;

use app::WinitHost;

/// Used when `RUST_LOG` is unset. `ilm_timing=debug` adds every phase onset.
const DEFAULT_LOG_FILTER: &str = "info,ilm_timing=info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

#[cfg(feature = "telemetry")]
fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing() -> bool {
    false
}

fn main() -> Result<()> {
    if !init_tracing() {
        eprintln!("no log output; build with the `telemetry` feature to see it");
    }

    // optional first argument: path to a JSON config
    let config = match std::env::args_os().nth(1) {
        Some(path) => {
            info!(path = %path.to_string_lossy(), "loading config");
            ExperimentConfig::load(&path)?
        }
        None => {
            let config = ExperimentConfig::default();
            config.validate()?;
            config
        }
    };

    let font = config.font_path.as_ref().map(load_font).transpose()?;
    let timer = HighPrecisionTimer::new();
    let mut host = WinitHost::new(&timer, config.px_per_degree, font)?;
    let mut sink = JsonResultWriter::new(&config.results_path);

    let mut runner = ExperimentRunner::from_config(config, &timer);
    let outcome = runner.run(&mut host, &mut sink)?;
    host.log_frame_stats();

    match outcome {
        RunOutcome::Completed => info!(trials = sink.results().len(), "experiment completed"),
        RunOutcome::Aborted => warn!(trials = sink.results().len(), "experiment aborted"),
    }
    Ok(())
}
