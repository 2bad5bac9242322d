//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the tick loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: pulse_core::config::ConfigError,
    },

    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: pulse_core::tick::TickError,
    },

    /// The core rejected a simulated activation.
    #[error("activation error: {source}")]
    Activation {
        /// The underlying activation error.
        #[from]
        source: pulse_core::state_machine::ActivationError,
    },

    /// A device lookup failed while reporting or upgrading.
    #[error("device error: {source}")]
    Device {
        /// The underlying device error.
        #[from]
        source: pulse_core::device::DeviceError,
    },

    /// The `scenario` section of the config file is unusable.
    #[error("scenario error: {message}")]
    Scenario {
        /// Description of the scenario failure.
        message: String,
    },

    /// The final status report could not be serialized.
    #[error("report error: {source}")]
    Report {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
