//! Configuration loading and typed config structures for the pulse core.
//!
//! The canonical configuration lives in `pulse-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads and validates the file. Every field has a default, so
//! an empty document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The document parsed but holds values the core cannot run with.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PulseConfig {
    /// Default timing and presentation profile for installed devices.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Parameters handed to the effect collaborator when a device fires.
    #[serde(default)]
    pub effect: EffectConfig,

    /// Host loop settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PulseConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the core depends on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        self.effect.validate()
    }
}

/// Default device profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceConfig {
    /// Priming time at upgrade rating 1, in seconds.
    #[serde(default = "default_base_priming_seconds")]
    pub base_priming_seconds: f64,

    /// How long the effect stays active, in seconds.
    #[serde(default = "default_active_seconds")]
    pub active_seconds: f64,

    /// How long the device vents after the effect, in seconds.
    #[serde(default = "default_cooling_down_seconds")]
    pub cooling_down_seconds: f64,

    /// Recharge time at upgrade rating 1, in seconds.
    #[serde(default = "default_base_cooldown_seconds")]
    pub base_cooldown_seconds: f64,

    /// Multiplier applied to priming and recharge once per rating above 1.
    #[serde(default = "default_rating_delay_factor")]
    pub rating_delay_factor: f32,

    /// Number of charge indicator levels.
    #[serde(default = "default_charge_capacity")]
    pub charge_capacity: u32,

    /// Broadcast channel for device reports.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Sound played on activation.
    #[serde(default = "default_activated_sound")]
    pub activated_sound: String,
}

impl DeviceConfig {
    /// Base priming duration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not a positive, finite
    /// number of seconds.
    pub fn base_priming(&self) -> Result<Duration, ConfigError> {
        positive_seconds("device.base_priming_seconds", self.base_priming_seconds)
    }

    /// Active duration.
    ///
    /// # Errors
    ///
    /// See [`DeviceConfig::base_priming`].
    pub fn active(&self) -> Result<Duration, ConfigError> {
        positive_seconds("device.active_seconds", self.active_seconds)
    }

    /// Cooling-down duration.
    ///
    /// # Errors
    ///
    /// See [`DeviceConfig::base_priming`].
    pub fn cooling_down(&self) -> Result<Duration, ConfigError> {
        positive_seconds("device.cooling_down_seconds", self.cooling_down_seconds)
    }

    /// Base recharge duration.
    ///
    /// # Errors
    ///
    /// See [`DeviceConfig::base_priming`].
    pub fn base_cooldown(&self) -> Result<Duration, ConfigError> {
        positive_seconds("device.base_cooldown_seconds", self.base_cooldown_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.base_priming()?;
        self.active()?;
        self.cooling_down()?;
        self.base_cooldown()?;
        if !(self.rating_delay_factor > 0.0 && self.rating_delay_factor <= 1.0) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "device.rating_delay_factor must be in (0, 1], got {}",
                    self.rating_delay_factor
                ),
            });
        }
        if self.charge_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "device.charge_capacity must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_priming_seconds: default_base_priming_seconds(),
            active_seconds: default_active_seconds(),
            cooling_down_seconds: default_cooling_down_seconds(),
            base_cooldown_seconds: default_base_cooldown_seconds(),
            rating_delay_factor: default_rating_delay_factor(),
            charge_capacity: default_charge_capacity(),
            channel: default_channel(),
            activated_sound: default_activated_sound(),
        }
    }
}

/// Effect parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EffectConfig {
    /// Energy drained from everything caught in the pulse.
    #[serde(default = "default_effect_magnitude")]
    pub magnitude: f32,

    /// Pulse radius in world units.
    #[serde(default = "default_effect_radius")]
    pub radius: f32,

    /// How long affected equipment stays disabled, in seconds.
    #[serde(default = "default_effect_duration_seconds")]
    pub duration_seconds: f64,
}

impl EffectConfig {
    /// How long affected equipment stays disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not a positive, finite
    /// number of seconds.
    pub fn duration(&self) -> Result<Duration, ConfigError> {
        positive_seconds("effect.duration_seconds", self.duration_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.duration()?;
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("effect.radius must be non-negative, got {}", self.radius),
            });
        }
        if !(self.magnitude.is_finite() && self.magnitude >= 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "effect.magnitude must be non-negative, got {}",
                    self.magnitude
                ),
            });
        }
        Ok(())
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            magnitude: default_effect_magnitude(),
            radius: default_effect_radius(),
            duration_seconds: default_effect_duration_seconds(),
        }
    }
}

/// Host loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Random seed for reproducible runs.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: default_max_ticks(),
            seed: default_seed(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn positive_seconds(field: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(ConfigError::Invalid {
            reason: format!("{field} must be a positive number of seconds, got {seconds}"),
        });
    }
    Duration::try_from_secs_f64(seconds).map_err(|err| ConfigError::Invalid {
        reason: format!("{field}: {err}"),
    })
}

const fn default_base_priming_seconds() -> f64 {
    10.0
}

const fn default_active_seconds() -> f64 {
    60.0
}

const fn default_cooling_down_seconds() -> f64 {
    30.0
}

const fn default_base_cooldown_seconds() -> f64 {
    300.0
}

const fn default_rating_delay_factor() -> f32 {
    0.8
}

const fn default_charge_capacity() -> u32 {
    5
}

fn default_channel() -> String {
    "Security".to_owned()
}

fn default_activated_sound() -> String {
    "/Audio/Machines/pulse_activate.ogg".to_owned()
}

const fn default_effect_magnitude() -> f32 {
    50_000.0
}

const fn default_effect_radius() -> f32 {
    100.0
}

const fn default_effect_duration_seconds() -> f64 {
    60.0
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_max_ticks() -> u64 {
    0
}

const fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_owned()
}
