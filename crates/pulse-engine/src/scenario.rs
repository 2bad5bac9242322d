//! Simulated world layout and interaction rates.
//!
//! The engine places a fixed number of devices into a fixed number of
//! zones at startup. During the run, simulated actors press device buttons
//! at random, and the effect collaborator fails at a configured rate.

use std::path::Path;

use pulse_core::device::DeviceProfile;
use pulse_core::system::PulseSystem;
use pulse_types::{DeviceId, ZoneId};
use serde::Deserialize;
use tracing::info;

use crate::error::EngineError;
use crate::sim_host::SimulatedHost;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Configuration for the simulated world, loaded from the `scenario`
/// section of `pulse-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Number of zones to create.
    #[serde(default = "default_zones")]
    pub zones: u32,

    /// Devices installed in each zone.
    #[serde(default = "default_devices_per_zone")]
    pub devices_per_zone: u32,

    /// Simulated seconds that pass per tick.
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,

    /// Chance per device per tick that an actor presses its button.
    #[serde(default = "default_activation_chance")]
    pub activation_chance: f64,

    /// Chance that a fired effect fails.
    #[serde(default = "default_effect_failure_chance")]
    pub effect_failure_chance: f64,

    /// Part rating every device is upgraded to after installation.
    #[serde(default = "default_upgrade_rating")]
    pub upgrade_rating: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            zones: default_zones(),
            devices_per_zone: default_devices_per_zone(),
            step_seconds: default_step_seconds(),
            activation_chance: default_activation_chance(),
            effect_failure_chance: default_effect_failure_chance(),
            upgrade_rating: default_upgrade_rating(),
        }
    }
}

impl ScenarioConfig {
    /// Check that every rate is a probability and the step is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scenario`] naming the offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("activation_chance", self.activation_chance),
            ("effect_failure_chance", self.effect_failure_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Scenario {
                    message: format!("scenario.{name} must be within [0, 1], got {value}"),
                });
            }
        }
        if !(self.step_seconds.is_finite() && self.step_seconds > 0.0) {
            return Err(EngineError::Scenario {
                message: format!(
                    "scenario.step_seconds must be positive, got {}",
                    self.step_seconds
                ),
            });
        }
        Ok(())
    }
}

const fn default_zones() -> u32 {
    3
}

const fn default_devices_per_zone() -> u32 {
    2
}

const fn default_step_seconds() -> f64 {
    1.0
}

const fn default_activation_chance() -> f64 {
    0.05
}

const fn default_effect_failure_chance() -> f64 {
    0.1
}

const fn default_upgrade_rating() -> u32 {
    1
}

/// Load the scenario configuration from `path`.
///
/// Reads the `scenario` section from the YAML config file. If the file
/// does not exist or lacks the `scenario` key, defaults are used.
///
/// # Errors
///
/// Returns [`EngineError::Scenario`] if the file cannot be read or parsed,
/// or holds out-of-range values.
pub fn load_scenario_config(path: &Path) -> Result<ScenarioConfig, EngineError> {
    if !path.exists() {
        return Ok(ScenarioConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Scenario {
        message: format!("failed to read config file: {e}"),
    })?;
    parse_scenario_config(&contents)
}

/// Parse the `scenario` section out of a full config document.
///
/// # Errors
///
/// Returns [`EngineError::Scenario`] if the YAML is malformed or holds
/// out-of-range values.
pub fn parse_scenario_config(yaml: &str) -> Result<ScenarioConfig, EngineError> {
    let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::Scenario {
        message: format!("failed to parse config YAML: {e}"),
    })?;

    let config = match raw.get("scenario") {
        Some(section) => {
            serde_yml::from_value(section.clone()).map_err(|e| EngineError::Scenario {
                message: format!("failed to parse scenario config: {e}"),
            })?
        }
        None => ScenarioConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

// -----------------------------------------------------------------------
// Placement
// -----------------------------------------------------------------------

/// Devices created at startup, grouped by zone.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// `(zone, devices)` in creation order.
    pub zones: Vec<(ZoneId, Vec<DeviceId>)>,
}

impl Layout {
    /// Every device in creation order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.zones.iter().flat_map(|(_, devices)| devices.iter().copied())
    }

    /// Total number of devices.
    pub fn device_count(&self) -> usize {
        self.zones.iter().map(|(_, devices)| devices.len()).sum()
    }
}

/// Create the zones and devices described by `config`, install every device
/// with `profile` and place it with `host`.
///
/// # Errors
///
/// Returns [`EngineError::Device`] if an upgrade targets a device that was
/// not installed.
pub fn populate(
    config: &ScenarioConfig,
    profile: &DeviceProfile,
    system: &mut PulseSystem,
    host: &mut SimulatedHost,
) -> Result<Layout, EngineError> {
    let mut layout = Layout::default();
    for _ in 0..config.zones {
        let zone = ZoneId::new();
        let mut devices = Vec::new();
        for _ in 0..config.devices_per_zone {
            let device = DeviceId::new();
            system.install(device, profile.clone());
            if config.upgrade_rating > 1 {
                system.on_upgrade(device, config.upgrade_rating)?;
            }
            host.place(device, zone);
            devices.push(device);
        }
        layout.zones.push((zone, devices));
    }

    info!(
        zones = layout.zones.len(),
        devices = layout.device_count(),
        upgrade_rating = config.upgrade_rating,
        "Devices placed"
    );
    Ok(layout)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_core::config::PulseConfig;

    use super::*;

    #[test]
    fn missing_section_uses_defaults() {
        let config = parse_scenario_config("engine:\n  seed: 7\n").unwrap();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn section_overrides_defaults() {
        let yaml = "scenario:\n  zones: 5\n  activation_chance: 0.5\n";
        let config = parse_scenario_config(yaml).unwrap();
        assert_eq!(config.zones, 5);
        assert!((config.activation_chance - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.devices_per_zone, default_devices_per_zone());
    }

    #[test]
    fn out_of_range_chance_is_rejected() {
        let yaml = "scenario:\n  effect_failure_chance: 1.5\n";
        assert!(matches!(
            parse_scenario_config(yaml),
            Err(EngineError::Scenario { .. })
        ));
    }

    #[test]
    fn populate_places_every_device() {
        let config = ScenarioConfig {
            zones: 2,
            devices_per_zone: 3,
            upgrade_rating: 2,
            ..ScenarioConfig::default()
        };
        let profile = DeviceProfile::from_config(&PulseConfig::default()).unwrap();
        let mut system = PulseSystem::new();
        let mut host = SimulatedHost::new(1, 0.0);

        let layout = populate(&config, &profile, &mut system, &mut host).unwrap();
        assert_eq!(layout.device_count(), 6);
        assert_eq!(system.devices().len(), 6);
        for (zone, devices) in &layout.zones {
            for device in devices {
                assert_eq!(host.placement(*device), Some(*zone));
                let status = system.describe(*device).unwrap();
                assert!(status.delay_multiplier < 1.0);
            }
        }
    }
}
