//! Headless host binary for the pulse core.
//!
//! Loads configuration, places devices into simulated zones, drives the
//! core on a real-time tick loop while simulated actors press buttons, and
//! prints a JSON status report when the run ends.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `pulse-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the default device profile
//! 4. Create the simulated host and place devices
//! 5. Run the tick loop
//! 6. Print the final report and end the round

mod error;
mod runner;
mod scenario;
mod sim_host;

use std::path::Path;

use pulse_core::config::PulseConfig;
use pulse_core::device::DeviceProfile;
use pulse_core::system::PulseSystem;
use pulse_types::RunLevel;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::runner::RunSettings;
use crate::sim_host::SimulatedHost;

/// Config file looked up relative to the working directory.
const CONFIG_PATH: &str = "pulse-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the tick loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so report where the
    //    config came from once it is.
    let config_path = Path::new(CONFIG_PATH);
    let (config, from_file) = load_config(config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("pulse-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        tick_interval_ms = config.engine.tick_interval_ms,
        max_ticks = config.engine.max_ticks,
        seed = config.engine.seed,
        "Configuration loaded"
    );

    // 3. Build the default device profile.
    let profile = DeviceProfile::from_config(&config)?;
    info!(
        priming = ?profile.base_priming,
        active = ?profile.active,
        cooling_down = ?profile.cooling_down,
        cooldown = ?profile.base_cooldown,
        charge_capacity = profile.charge_capacity,
        "Device profile ready"
    );

    // 4. Create the host and place devices.
    let scenario_config = scenario::load_scenario_config(config_path)?;
    let mut host = SimulatedHost::new(
        config.engine.seed.wrapping_add(1),
        scenario_config.effect_failure_chance,
    );
    let mut system = PulseSystem::new();
    let layout = scenario::populate(&scenario_config, &profile, &mut system, &mut host)?;

    // 5. Run the tick loop.
    let settings = RunSettings::new(
        config.engine.tick_interval_ms,
        config.engine.max_ticks,
        config.engine.seed,
        &scenario_config,
    );
    let report = runner::run(&mut system, &mut host, &layout, &settings).await?;

    // 6. Report, then end the round.
    runner::log_run_end(&report);
    let json = serde_json::to_string_pretty(&report).map_err(EngineError::from)?;
    println!("{json}");
    system.on_run_level_changed(RunLevel::PostRound);

    info!("pulse-engine shutdown complete");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
fn load_config(path: &Path) -> Result<(PulseConfig, bool), EngineError> {
    if path.exists() {
        Ok((PulseConfig::from_file(path)?, true))
    } else {
        Ok((PulseConfig::default(), false))
    }
}
