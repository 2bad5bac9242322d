//! Zone-clocked scheduling core for pulse generator devices.
//!
//! A pulse generator cycles through priming, active, cooling-down and
//! recharging phases. Each phase ends at a deadline measured on the clock of
//! the zone the device sits in, and zone clocks only move while their zone
//! is not paused.
//!
//! # Modules
//!
//! - [`clock`] -- Per-zone time accumulators and active-device sets.
//! - [`charge`] -- Quantized charge indicator.
//! - [`config`] -- Configuration loading from `pulse-config.yaml` into
//!   strongly-typed structs.
//! - [`device`] -- Installed device records and profiles.
//! - [`host`] -- Collaborator traits and [`RecordingHost`].
//! - [`lifecycle`] -- Zone removal, device removal and session reset.
//! - [`state_machine`] -- Activation and deadline transitions.
//! - [`system`] -- [`PulseSystem`], the facade a host world drives.
//! - [`tick`] -- The per-tick update pass.
//! - [`upgrade`] -- Rating-scaled priming and recharge durations.
//!
//! [`RecordingHost`]: host::RecordingHost
//! [`PulseSystem`]: system::PulseSystem

pub mod charge;
pub mod clock;
pub mod config;
pub mod device;
pub mod host;
pub mod lifecycle;
pub mod state_machine;
pub mod system;
pub mod tick;
pub mod upgrade;
