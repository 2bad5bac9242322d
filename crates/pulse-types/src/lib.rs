//! Shared type definitions for the pulse device core.
//!
//! Hosts and the scheduling core exchange these types: identifiers for the
//! host-owned entities, the enumerations that describe a device's cycle and
//! presentation, and the per-device timing record.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for devices, zones and actors
//! - [`enums`] -- Cycle phases, message keys, visual flags, run levels
//! - [`structs`] -- The device timing record and inspection snapshot

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DeviceStateType, MessageKey, RunLevel, VisualFlag};
pub use ids::{ActorId, DeviceId, ZoneId};
pub use structs::{
    CycleState, DeviceState, DeviceStatus, ExamineLine, IDLE_CHARGE, ceil_seconds,
};
