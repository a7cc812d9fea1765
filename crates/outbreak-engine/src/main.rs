//! Worker binary for the Outbreak epidemic simulation.
//!
//! Builds one simulation from YAML configuration, feeds it control
//! commands read as JSON lines from stdin, and logs events and daily
//! metrics until the run ends.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `OUTBREAK_CONFIG` or `outbreak-config.yaml`
//! 3. Build the simulation (population generation)
//! 4. Subscribe the metrics aggregator and the event log
//! 5. Start the stdin command reader
//! 6. Run the simulation loop
//! 7. Log the result

mod command_source;
mod error;
mod event_log;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use outbreak_core::{LogMetricsSink, MetricsAggregator, Simulation, SimulationConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::event_log::EventLog;

const DEFAULT_CONFIG_PATH: &str = "outbreak-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, population generation or the event
/// bus shutdown fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("outbreak-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        simulation_id = %config.simulation.id,
        num_agents = config.simulation.num_agents,
        time_step = config.simulation.time_step,
        seed = config.simulation.seed,
        max_epochs = config.simulation.max_epochs,
        jurisdictions = config.jurisdictions.len(),
        "Configuration loaded"
    );

    // 3. Build the simulation.
    let mut simulation = Simulation::new(&config).map_err(EngineError::from)?;

    // 4. Subscribers, in delivery order.
    simulation.subscribe(MetricsAggregator::new().into_subscriber(LogMetricsSink));
    let event_log = Arc::new(Mutex::new(EventLog::new()));
    {
        let event_log = Arc::clone(&event_log);
        simulation.subscribe(move |event| {
            event_log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(event);
        });
    }

    // 5. Commands from stdin.
    let reader = command_source::spawn_stdin(simulation.command_sender()).map_err(|e| {
        EngineError::CommandSource {
            message: format!("failed to start stdin reader: {e}"),
        }
    })?;
    info!("Reading JSON-lines commands from stdin");

    // 6. Run.
    let result = simulation.start().await.map_err(EngineError::from)?;

    // 7. Log results. The reader thread is left behind if the run ended on
    // its own; it holds no state worth joining.
    if reader.is_finished() {
        match reader.join() {
            Ok(Ok(forwarded)) => info!(forwarded, "Command reader finished"),
            Ok(Err(e)) => warn!(error = %e, "Command reader stopped early"),
            Err(_panic) => warn!("Command reader panicked"),
        }
    }
    event_log
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .log_summary();

    let census = simulation.census();
    info!(
        end_reason = ?result.end_reason,
        total_epochs = result.total_epochs,
        commands_processed = result.commands_processed,
        drained = result.drained,
        susceptible = census.susceptible,
        infected = census.infected,
        infectious = census.infectious,
        immune = census.immune,
        "outbreak-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from the path in `OUTBREAK_CONFIG`, falling back to
/// `outbreak-config.yaml` in the working directory, then to defaults.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = std::env::var_os("OUTBREAK_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(&config_path)?)
    } else {
        warn!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
