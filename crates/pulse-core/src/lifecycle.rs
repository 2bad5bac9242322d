//! Zone, device and session teardown.
//!
//! These paths run outside the normal transition table: they force devices
//! straight to idle and drop zone bookkeeping without emitting any
//! notification. They share the single-threaded tick with the scheduler, so
//! they never run while a zone's active set is being scanned.

use pulse_types::{DeviceId, DeviceState, RunLevel, ZoneId};
use tracing::{debug, info};

use crate::clock::ZoneRegistry;
use crate::device::DeviceTable;

/// Outcome of removing a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneRemoval {
    /// Whether the zone had a clock.
    pub was_tracked: bool,
    /// Devices that were forced back to idle.
    pub reset: Vec<DeviceId>,
}

/// Clear all bookkeeping for `zone` and force every device cycling in it
/// back to idle.
pub fn remove_zone(
    registry: &mut ZoneRegistry,
    devices: &mut DeviceTable,
    zone: ZoneId,
) -> ZoneRemoval {
    let was_tracked = registry.clear_zone(zone).is_some();

    let mut reset = Vec::new();
    for (device, record) in devices.iter_mut() {
        if record.zone != Some(zone) {
            continue;
        }
        record.state.force_idle();
        record.zone = None;
        reset.push(device);
    }

    info!(%zone, was_tracked, reset = reset.len(), "Zone removed");
    ZoneRemoval { was_tracked, reset }
}

/// Remove `device` from the core.
///
/// The device is deregistered from whichever zone it was active in and its
/// record dropped, so no later tick can transition it. Returns the state it
/// had at removal, or `None` if the device was unknown.
pub fn remove_device(
    registry: &mut ZoneRegistry,
    devices: &mut DeviceTable,
    device: DeviceId,
) -> Option<DeviceState> {
    let zone = registry.deregister_device(device);
    let record = devices.remove(device)?;
    debug!(%device, ?zone, state = %record.state.state_type(), "Device removed");

    Some(record.state)
}

/// Drop every zone clock and force all devices back to idle.
pub fn reset_session(registry: &mut ZoneRegistry, devices: &mut DeviceTable) {
    let zones = registry.len();
    registry.clear_all();

    let mut reset: usize = 0;
    for (_, record) in devices.iter_mut() {
        if record.state.state_type().is_cycling() {
            reset = reset.saturating_add(1);
        }
        record.state.force_idle();
        record.zone = None;
    }

    info!(zones, reset, "Session reset");
}

/// React to a run-level change. Anything other than [`RunLevel::InRound`]
/// ends the round and resets the session.
///
/// Returns `true` if a reset happened.
pub fn on_run_level_changed(
    registry: &mut ZoneRegistry,
    devices: &mut DeviceTable,
    level: RunLevel,
) -> bool {
    if level == RunLevel::InRound {
        return false;
    }
    reset_session(registry, devices);
    true
}
